use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, MiddlewarePipeline, Pipeline, RequestHandler};
use crate::router::RouteResolver;

/// Errors found while assembling a [`Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("route `{route}` references unknown middleware `{alias}`")]
    UnknownMiddleware { route: String, alias: String },
    #[error("route `{route}` references unregistered handler `{handler}`")]
    UnknownHandler { route: String, handler: String },
}

/// Answers unmatched requests with [`PipelineError::RouteNotFound`].
struct NotFound;

impl RequestHandler for NotFound {
    fn handle(&self, request: Request) -> Result<Response, PipelineError> {
        Err(PipelineError::RouteNotFound {
            method: request.method.to_string(),
            path: request.path,
        })
    }
}

/// Collects handlers and middleware, then validates them against the routes.
pub struct DispatcherBuilder {
    resolver: Arc<dyn RouteResolver>,
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
    global: Vec<Arc<dyn Middleware>>,
    aliases: HashMap<String, Arc<dyn Middleware>>,
    not_found: Arc<dyn RequestHandler>,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn new<R: RouteResolver + 'static>(resolver: R) -> Self {
        Self::from_arc(Arc::new(resolver))
    }

    #[must_use]
    pub fn from_arc(resolver: Arc<dyn RouteResolver>) -> Self {
        Self {
            resolver,
            handlers: HashMap::new(),
            global: Vec::new(),
            aliases: HashMap::new(),
            not_found: Arc::new(NotFound),
        }
    }

    /// Register the handler for a route's handler id, replacing any previous one.
    #[must_use]
    pub fn handler<H: RequestHandler + 'static>(self, id: &str, handler: H) -> Self {
        self.handler_arc(id, Arc::new(handler))
    }

    #[must_use]
    pub fn handler_arc(mut self, id: &str, handler: Arc<dyn RequestHandler>) -> Self {
        if self.handlers.insert(id.to_string(), handler).is_some() {
            warn!(handler_name = %id, "Replaced existing handler");
        }
        self
    }

    /// Middleware run for every request, matched or not, outermost first.
    #[must_use]
    pub fn middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.middleware_arc(Arc::new(middleware))
    }

    #[must_use]
    pub fn middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.global.push(middleware);
        self
    }

    /// Middleware routes and groups refer to by alias.
    #[must_use]
    pub fn alias<M: Middleware + 'static>(self, name: &str, middleware: M) -> Self {
        self.alias_arc(name, Arc::new(middleware))
    }

    #[must_use]
    pub fn alias_arc(mut self, name: &str, middleware: Arc<dyn Middleware>) -> Self {
        self.aliases.insert(name.to_string(), middleware);
        self
    }

    /// Handler for unmatched requests, run inside the global middleware.
    #[must_use]
    pub fn not_found<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.not_found = Arc::new(handler);
        self
    }

    /// Resolve every route's aliases and handler into a composed chain.
    ///
    /// # Errors
    ///
    /// [`DispatchError`] naming the first route with an unknown alias or an
    /// unregistered handler.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        let mut chains = HashMap::new();
        for route in self.resolver.routes() {
            let key = route.chain_key();
            if chains.contains_key(&key) {
                debug!(route = %route, "Shadowed route skipped");
                continue;
            }

            let handler = self.handlers.get(route.handler()).ok_or_else(|| {
                DispatchError::UnknownHandler {
                    route: key.clone(),
                    handler: route.handler().to_string(),
                }
            })?;

            let mut pipeline = MiddlewarePipeline::new().pipe_all(self.global.iter().cloned());
            for alias in route.middleware() {
                let middleware = self.aliases.get(alias).ok_or_else(|| DispatchError::UnknownMiddleware {
                    route: key.clone(),
                    alias: alias.clone(),
                })?;
                pipeline = pipeline.pipe_arc(Arc::clone(middleware));
            }

            chains.insert(key, pipeline.then_arc(Arc::clone(handler)));
        }

        let fallback = MiddlewarePipeline::new()
            .pipe_all(self.global.iter().cloned())
            .then_arc(self.not_found);

        info!(
            routes = chains.len(),
            handlers = self.handlers.len(),
            global_middleware = self.global.len(),
            aliases = self.aliases.len(),
            "Dispatcher assembled"
        );

        Ok(Dispatcher {
            resolver: self.resolver,
            chains,
            fallback,
        })
    }
}

/// Routes each request through its matched route's precomposed chain.
///
/// The route match is attached to the request before the chain runs, so
/// every middleware can read path parameters and the API version.
pub struct Dispatcher {
    resolver: Arc<dyn RouteResolver>,
    chains: HashMap<String, Pipeline>,
    fallback: Pipeline,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chains", &self.chains)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn builder<R: RouteResolver + 'static>(resolver: R) -> DispatcherBuilder {
        DispatcherBuilder::new(resolver)
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn RouteResolver> {
        &self.resolver
    }

    /// # Errors
    ///
    /// Whatever the chain produces; [`PipelineError::RouteNotFound`] for
    /// unmatched requests unless a custom not-found handler answers them.
    pub fn dispatch(&self, request: Request) -> Result<Response, PipelineError> {
        let Some(found) = self.resolver.resolve(&request) else {
            warn!(
                request_id = %request.request_id,
                method = %request.method,
                path = %request.path,
                "No route matched"
            );
            return self.fallback.handle(request);
        };

        let key = found.route.chain_key();
        let Some(chain) = self.chains.get(&key) else {
            return Err(PipelineError::HandlerNotFound(found.route.handler().to_string()));
        };

        info!(
            request_id = %request.request_id,
            handler_name = %found.route.handler(),
            method = %request.method,
            path = %request.path,
            version = ?found.version().map(|v| v.version()),
            "Request dispatched to handler"
        );
        chain.handle(request.with_route_match(Arc::new(found)))
    }
}

impl RequestHandler for Dispatcher {
    fn handle(&self, request: Request) -> Result<Response, PipelineError> {
        self.dispatch(request)
    }
}
