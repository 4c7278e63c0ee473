//! # Middleware Module
//!
//! Ready-made layers for a [`MiddlewarePipeline`](crate::pipeline::MiddlewarePipeline).
//!
//! | Middleware | Role |
//! |------------|------|
//! | [`ErrorHandlerMiddleware`] | Renders any error as its JSON response; place outermost |
//! | [`TracingMiddleware`] | Request span, completion and slow-request logs |
//! | [`CorsMiddleware`] | Preflight answers and CORS headers |
//! | [`RateLimitMiddleware`] | Fixed-window limits per caller and scope |
//! | [`AuthMiddleware`] | Bearer token verification |
//! | [`ApiVersionMiddleware`] | `X-API-Version` and deprecation headers |
//! | [`FieldFilterMiddleware`] | `?fields=` response projection |
//! | [`CacheMiddleware`] | ETag / Last-Modified and 304 answers |
//!
//! A typical order is error handler, tracing, CORS, rate limit, auth, API
//! version, field filter, cache. Rate limiting before auth keys anonymous
//! callers by address; after auth it keys them by user id. With the field
//! filter outside the cache, the cache projects the body before computing its
//! ETag, so validators always match the served fields. CORS renders the errors
//! of allowed origins itself so they carry the CORS headers.
//!
//! Simple layers that only look at a request before it runs and at the
//! response afterwards implement [`Interceptor`] instead of the full
//! [`Middleware`](crate::pipeline::Middleware) trait.

mod api_version;
mod auth;
mod cache;
mod core;
mod cors;
mod error_handler;
mod field_filter;
mod rate_limit;
mod tracing;

pub use self::core::Interceptor;
pub use self::tracing::TracingMiddleware;
pub use api_version::ApiVersionMiddleware;
pub use auth::AuthMiddleware;
pub use cache::CacheMiddleware;
pub use cors::CorsMiddleware;
pub use error_handler::ErrorHandlerMiddleware;
pub use field_filter::{filter_fields, parse_fields, FieldFilterMiddleware};
pub use rate_limit::RateLimitMiddleware;
