//! # Dispatcher Module
//!
//! Ties a router to handlers and middleware.
//!
//! ## Request Flow
//!
//! 1. The resolver ([`Router`](crate::router::Router) or
//!    [`VersionedRouter`](crate::router::VersionedRouter)) matches the request
//! 2. The [`RouteMatch`](crate::router::RouteMatch) is attached to the request
//! 3. The route's chain runs: global middleware, then the route's aliased
//!    middleware (group aliases first), then the handler registered for the
//!    route's handler id
//! 4. Unmatched requests run through the global middleware only, ending in a
//!    not-found handler
//!
//! Chains are composed once in [`DispatcherBuilder::build`], which also fails
//! fast on routes naming an unknown middleware alias or handler.
//!
//! ```rust
//! use serde_json::json;
//! use waypoint::dispatcher::Dispatcher;
//! use waypoint::message::{Request, Response};
//! use waypoint::middleware::ErrorHandlerMiddleware;
//! use waypoint::pipeline::handler_fn;
//! use waypoint::router::Router;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new();
//! router.get("/clients/{id}", "clients.show")?;
//!
//! let dispatcher = Dispatcher::builder(router)
//!     .middleware(ErrorHandlerMiddleware)
//!     .handler("clients.show", handler_fn(|req| {
//!         Ok(Response::ok(json!({ "id": req.path_param("id") })))
//!     }))
//!     .build()?;
//!
//! let res = dispatcher.dispatch(Request::get("/clients/7"))?;
//! assert_eq!(res.body["id"], "7");
//! assert_eq!(dispatcher.dispatch(Request::get("/nope"))?.status, 404);
//! # Ok(())
//! # }
//! ```

mod core;

pub use self::core::{DispatchError, Dispatcher, DispatcherBuilder};
