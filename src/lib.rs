//! # waypoint
//!
//! **waypoint** is the request-processing core of an HTTP API: pattern routing
//! with API versioning, a composable middleware pipeline, fixed-window rate
//! limiting and conditional-response caching. It owns no socket; a host
//! server turns its wire requests into [`message::Request`] values and sends
//! the returned [`message::Response`] back.
//!
//! ## Architecture
//!
//! - **[`router`]** - `{name}`, `{name?}` and `{name:regex}` templates compiled at
//!   registration, first-match-wins lookup, groups, named-route URLs, and
//!   [`router::VersionedRouter`] with default-version fallback
//! - **[`pipeline`]** - [`pipeline::Middleware`] chain of responsibility around a
//!   [`pipeline::RequestHandler`]
//! - **[`dispatcher`]** - resolves a request, attaches its route match and runs
//!   the route's precomposed chain
//! - **[`middleware`]** - error rendering, tracing, CORS, rate limiting, auth,
//!   API-version headers, field filtering and conditional caching
//! - **[`rate_limit`]** / **[`cache`]** - the counter and validator engines
//!   behind their middleware, both over a shared [`store::TtlStore`]
//! - **[`config`]** / **[`logging`]** - boot-time configuration and subscriber setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host server
//!     participant Dispatcher
//!     participant Router as VersionedRouter
//!     participant Chain as Middleware chain
//!     participant Handler
//!
//!     Host->>Dispatcher: dispatch(Request)
//!     Dispatcher->>Router: resolve(&request)
//!     alt No Route Match
//!         Dispatcher->>Chain: global middleware
//!         Chain-->>Host: 404 Not Found
//!     end
//!     Router-->>Dispatcher: RouteMatch (params, version)
//!     Dispatcher->>Chain: request.with_route_match(..)
//!     Chain->>Chain: error handler, tracing, CORS,<br/>rate limit, auth
//!     alt Rejected
//!         Chain-->>Host: 401 / 429 JSON error
//!     end
//!     Chain->>Handler: handle(request)
//!     Handler-->>Chain: Response
//!     Chain->>Chain: field filter, ETag / 304,<br/>version headers
//!     Chain-->>Host: Response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use waypoint::cache::{CacheDirectives, CacheManager};
//! use waypoint::dispatcher::Dispatcher;
//! use waypoint::message::{Request, Response};
//! use waypoint::middleware::{ApiVersionMiddleware, CacheMiddleware, ErrorHandlerMiddleware};
//! use waypoint::pipeline::handler_fn;
//! use waypoint::router::VersionedRouter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = VersionedRouter::new();
//! router.register_version("v1", true, Some("Use v2"), Some("2025-12-31"));
//! router.register_version("v2", false, None, None);
//! router.set_default_version("v2")?;
//! router.version("v1", &[], |r| r.get("/api/clients", "clients.index").map(|_| ()))?;
//! router.version("v2", &["cache"], |r| r.get("/api/clients", "clients.index").map(|_| ()))?;
//!
//! let cache = Arc::new(CacheManager::in_memory());
//! let dispatcher = Dispatcher::builder(router)
//!     .middleware(ErrorHandlerMiddleware)
//!     .middleware(ApiVersionMiddleware)
//!     .alias("cache", CacheMiddleware::new(cache, CacheDirectives::default()))
//!     .handler("clients.index", handler_fn(|_req| Ok(Response::ok(json!([{ "id": 1 }])))))
//!     .build()?;
//!
//! let res = dispatcher.dispatch(Request::get("/v1/api/clients"))?;
//! assert_eq!(res.get_header("Deprecation"), Some("true"));
//! assert_eq!(res.get_header("Sunset"), Some("2025-12-31"));
//!
//! let res = dispatcher.dispatch(Request::get("/api/clients"))?;
//! assert_eq!(res.get_header("X-API-Version"), Some("v2"));
//! let etag = res.get_header("ETag").unwrap().to_string();
//!
//! let res = dispatcher.dispatch(Request::get("/api/clients").with_header("If-None-Match", etag))?;
//! assert_eq!(res.status, 304);
//! # Ok(())
//! # }
//! ```
//!
//! ## Runtime Considerations
//!
//! Execution is synchronous: a request runs to completion on the calling
//! thread. Route tables and version registries are immutable after boot; the
//! only shared mutable state is the rate-limit and cache store, which
//! [`store::MemoryStore`] guards with a single mutex.

pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod message;
pub mod middleware;
pub mod pipeline;
pub mod rate_limit;
pub mod router;
pub mod security;
pub mod store;

pub use config::PipelineConfig;
pub use dispatcher::{DispatchError, Dispatcher};
pub use error::{PipelineError, RouteError};
pub use message::{Request, Response};
pub use pipeline::{Middleware, MiddlewarePipeline, Pipeline, RequestHandler};
pub use router::{ApiVersion, RouteMatch, Router, VersionedRouter};
