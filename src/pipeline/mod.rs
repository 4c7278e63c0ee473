//! # Pipeline Module
//!
//! Chain-of-responsibility composition of [`Middleware`] around a final
//! [`RequestHandler`].
//!
//! ## Ordering
//!
//! The first middleware piped is the outermost layer: its pre-processing runs
//! first and its post-processing runs last.
//!
//! ```text
//!   request ──► A.pre ──► B.pre ──► handler
//!                                      │
//!   response ◄── A.post ◄── B.post ◄───┘
//! ```
//!
//! A middleware can replace the request before forwarding, transform the
//! response on the way back, or not call [`Next::run`] at all and answer on
//! its own (short-circuit).
//!
//! ## Reuse
//!
//! A [`Pipeline`] is immutable once built. Each call walks the shared
//! middleware slice through a fresh [`Next`] cursor, so a single pipeline
//! serves any number of requests, concurrently or not.
//!
//! ```rust
//! use serde_json::json;
//! use waypoint::message::{Request, Response};
//! use waypoint::pipeline::{handler_fn, middleware_fn, MiddlewarePipeline, RequestHandler};
//!
//! let pipeline = MiddlewarePipeline::new()
//!     .pipe(middleware_fn(|req, next| {
//!         let res = next.run(req)?;
//!         Ok(res.with_header("X-Outer", "1"))
//!     }))
//!     .then(handler_fn(|_req| Ok(Response::ok(json!({ "ok": true })))));
//!
//! let res = pipeline.handle(Request::get("/")).unwrap();
//! assert_eq!(res.get_header("X-Outer"), Some("1"));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::message::{Request, Response};

/// Innermost request processor.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: Request) -> Result<Response, PipelineError>;
}

/// One layer of the pipeline.
pub trait Middleware: Send + Sync {
    /// Process `request`, usually by forwarding it through `next`.
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError>;
}

impl<T: RequestHandler + ?Sized> RequestHandler for Arc<T> {
    fn handle(&self, request: Request) -> Result<Response, PipelineError> {
        (**self).handle(request)
    }
}

/// Cursor over the remaining chain for one invocation.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    handler: &'a dyn RequestHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a [Arc<dyn Middleware>], handler: &'a dyn RequestHandler) -> Self {
        Self {
            middleware,
            handler,
        }
    }

    /// Forward the request to the rest of the chain.
    pub fn run(self, request: Request) -> Result<Response, PipelineError> {
        match self.middleware.split_first() {
            Some((current, rest)) => current.process(request, Next::new(rest, self.handler)),
            None => self.handler.handle(request),
        }
    }

    /// Number of middleware still ahead of the handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.middleware.len()
    }
}

/// Builder collecting middleware in call order.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; earlier ones wrap later ones.
    #[must_use]
    pub fn pipe<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.pipe_arc(Arc::new(middleware))
    }

    #[must_use]
    pub fn pipe_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    #[must_use]
    pub fn pipe_all<I>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.middleware.extend(middleware);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Terminate the chain with `handler`.
    #[must_use]
    pub fn then<H: RequestHandler + 'static>(self, handler: H) -> Pipeline {
        self.then_arc(Arc::new(handler))
    }

    #[must_use]
    pub fn then_arc(self, handler: Arc<dyn RequestHandler>) -> Pipeline {
        Pipeline {
            middleware: Arc::from(self.middleware),
            handler,
        }
    }
}

/// A composed, reusable chain.
#[derive(Clone)]
pub struct Pipeline {
    middleware: Arc<[Arc<dyn Middleware>]>,
    handler: Arc<dyn RequestHandler>,
}

impl Pipeline {
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl RequestHandler for Pipeline {
    fn handle(&self, request: Request) -> Result<Response, PipelineError> {
        Next::new(&self.middleware, self.handler.as_ref()).run(request)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Handler backed by a closure.
pub struct FnHandler<F>(F);

/// Wrap a closure as a [`RequestHandler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Result<Response, PipelineError> + Send + Sync,
{
    FnHandler(f)
}

impl<F> RequestHandler for FnHandler<F>
where
    F: Fn(Request) -> Result<Response, PipelineError> + Send + Sync,
{
    fn handle(&self, request: Request) -> Result<Response, PipelineError> {
        (self.0)(request)
    }
}

/// Middleware backed by a closure.
pub struct FnMiddleware<F>(F);

/// Wrap a closure as a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request, Next<'_>) -> Result<Response, PipelineError> + Send + Sync,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next<'_>) -> Result<Response, PipelineError> + Send + Sync,
{
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        (self.0)(request, next)
    }
}
