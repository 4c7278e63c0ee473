//! # Router Module
//!
//! Pattern-based route matching with groups, named routes and API versions.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling path templates (`/clients/{id:\d+}`, `/users/{id?}`) into anchored
//!   matchers once, at registration time
//! - Matching requests to routes in registration order (first match wins)
//! - Extracting path parameters from matched routes
//! - Generating URLs for named routes
//! - Resolving the API version of a request and falling back to the default
//!   version for un-prefixed paths ([`VersionedRouter`])
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use waypoint::router::VersionedRouter;
//!
//! # fn main() -> Result<(), waypoint::RouteError> {
//! let mut router = VersionedRouter::new();
//! router.register_version("v1", true, Some("Use v2"), Some("2025-12-31"));
//! router.register_version("v2", false, None, None);
//! router.set_default_version("v2")?;
//!
//! router.version("v1", &[], |r| r.get("/api/clients", "v1.clients.index").map(|_| ()))?;
//! router.version("v2", &[], |r| r.get("/api/clients", "v2.clients.index").map(|_| ()))?;
//!
//! let m = router.match_route(&Method::GET, "/api/clients").unwrap();
//! assert_eq!(m.handler_name(), "v2.clients.index");
//! assert_eq!(m.version().unwrap().version(), "v2");
//! # Ok(())
//! # }
//! ```

mod core;
mod pattern;
mod route;
mod versioned;

pub use self::core::{RouteMatch, RouteRegistration, RouteResolver, Router, UrlBuilder};
pub use route::Route;
pub use versioned::{ApiVersion, PathVersion, VersionedRouter};
