//! Router core - route registry, groups, first-match dispatch and reverse URLs.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::{debug, info};

use super::route::Route;
use super::versioned::ApiVersion;
use crate::error::RouteError;
use crate::message::Request;

/// Result of successfully matching a request to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (shared with the route table)
    pub route: Arc<Route>,
    /// Path parameters extracted from the URL (e.g., `{id}` → `{"id": "123"}`)
    pub params: HashMap<String, String>,
    /// Query string parameters copied from the request
    pub query: HashMap<String, String>,
    version: Option<Arc<ApiVersion>>,
}

impl RouteMatch {
    #[must_use]
    pub fn new(route: Arc<Route>, params: HashMap<String, String>) -> Self {
        Self {
            route,
            params,
            query: HashMap::new(),
            version: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        self.route.handler()
    }

    /// API version resolved by a [`VersionedRouter`](super::VersionedRouter).
    #[must_use]
    pub fn version(&self) -> Option<&Arc<ApiVersion>> {
        self.version.as_ref()
    }

    pub(crate) fn set_version(&mut self, version: Arc<ApiVersion>) {
        self.version = Some(version);
    }
}

/// Anything the dispatcher can resolve requests against.
pub trait RouteResolver: Send + Sync {
    /// Resolve a request, or `None` when nothing matches.
    fn resolve(&self, request: &Request) -> Option<RouteMatch>;

    /// Every registered route in registration order.
    fn routes(&self) -> &[Arc<Route>];
}

#[derive(Debug, Clone, Default)]
struct GroupContext {
    prefix: String,
    middleware: Vec<String>,
}

/// Ordered route registry.
///
/// Routes are tried in registration order and the first one that matches
/// wins. There is no specificity ranking: a looser pattern registered first
/// shadows a literal one registered later.
///
/// ```
/// use http::Method;
/// use waypoint::router::Router;
///
/// # fn main() -> Result<(), waypoint::RouteError> {
/// let mut router = Router::new();
/// router.group("/api", &["auth"], |r| {
///     r.get(r"/clients/{id:\d+}", "clients.show")?.name("clients.show")?;
///     Ok(())
/// })?;
///
/// let m = router.match_route(&Method::GET, "/api/clients/42").unwrap();
/// assert_eq!(m.get_path_param("id"), Some("42"));
/// assert_eq!(m.route.middleware(), ["auth"]);
/// assert_eq!(router.url_for("clients.show").param("id", 42).build()?, "/api/clients/42");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Arc<Route>>,
    names: HashMap<String, usize>,
    groups: Vec<GroupContext>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route under the active group prefix and middleware.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when the combined pattern is malformed.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: &str,
    ) -> Result<RouteRegistration<'_>, RouteError> {
        let context = self.groups.last().cloned().unwrap_or_default();
        let full_pattern = format!("{}{}", context.prefix, pattern);

        let mut route = Route::new(method, full_pattern, handler)?;
        route.push_middleware(context.middleware);

        debug!(
            method = %route.method(),
            pattern = %route.pattern(),
            handler = %route.handler(),
            middleware = ?route.middleware(),
            "Route registered"
        );

        self.routes.push(Arc::new(route));
        let index = self.routes.len() - 1;
        Ok(RouteRegistration {
            router: self,
            index,
        })
    }

    pub fn get(&mut self, pattern: &str, handler: &str) -> Result<RouteRegistration<'_>, RouteError> {
        self.add_route(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: &str) -> Result<RouteRegistration<'_>, RouteError> {
        self.add_route(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: &str) -> Result<RouteRegistration<'_>, RouteError> {
        self.add_route(Method::PUT, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: &str) -> Result<RouteRegistration<'_>, RouteError> {
        self.add_route(Method::PATCH, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: &str) -> Result<RouteRegistration<'_>, RouteError> {
        self.add_route(Method::DELETE, pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: &str) -> Result<RouteRegistration<'_>, RouteError> {
        self.add_route(Method::OPTIONS, pattern, handler)
    }

    pub fn head(&mut self, pattern: &str, handler: &str) -> Result<RouteRegistration<'_>, RouteError> {
        self.add_route(Method::HEAD, pattern, handler)
    }

    /// Register routes under a shared prefix and middleware.
    ///
    /// Groups nest: the prefix is appended to the enclosing group's prefix
    /// and the middleware follows the enclosing group's middleware. The
    /// previous context is restored when the callback returns, including on
    /// error.
    pub fn group<F>(&mut self, prefix: &str, middleware: &[&str], callback: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Router) -> Result<(), RouteError>,
    {
        let parent = self.groups.last().cloned().unwrap_or_default();
        let mut context = GroupContext {
            prefix: format!("{}{}", parent.prefix, prefix),
            middleware: parent.middleware,
        };
        context
            .middleware
            .extend(middleware.iter().map(|m| (*m).to_string()));

        self.groups.push(context);
        let result = callback(self);
        self.groups.pop();
        result
    }

    /// Find the first route matching `method` and `path`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, routes = self.routes.len(), "Route match attempt");

        let found = self.routes.iter().find_map(|route| {
            route
                .try_match(method, path)
                .map(|params| RouteMatch::new(Arc::clone(route), params))
        });

        match &found {
            Some(m) => debug!(
                method = %method,
                path = %path,
                handler = %m.route.handler(),
                pattern = %m.route.pattern(),
                params = ?m.params,
                "Route matched"
            ),
            None => debug!(method = %method, path = %path, "No route matched"),
        }
        found
    }

    /// Match a request, carrying its query parameters into the result.
    #[must_use]
    pub fn match_request(&self, request: &Request) -> Option<RouteMatch> {
        self.match_route(&request.method, &request.path)
            .map(|mut m| {
                m.query = request.query.clone();
                m
            })
    }

    /// Generate a URL for a named route.
    ///
    /// # Errors
    ///
    /// - [`RouteError::UnknownRoute`] if no route has that name
    /// - [`RouteError::MissingParameter`] if a required placeholder is unresolved
    pub fn url(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        query: &[(String, String)],
    ) -> Result<String, RouteError> {
        let route = self
            .route_by_name(name)
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?;
        let mut url = route.build_path(params)?;
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&encoded.join("&"));
        }
        Ok(url)
    }

    /// Fluent form of [`Router::url`].
    #[must_use]
    pub fn url_for(&self, name: &str) -> UrlBuilder<'_> {
        UrlBuilder {
            router: self,
            name: name.to_string(),
            params: HashMap::new(),
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_route(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    #[must_use]
    pub fn route_by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.names.get(name).and_then(|&i| self.routes.get(i))
    }

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Log the route table at info level.
    pub fn dump_routes(&self) {
        info!(routes_count = self.routes.len(), named = self.names.len(), "Routing table");
        for route in &self.routes {
            info!(route = %route, middleware = ?route.middleware(), "Route");
        }
    }

    fn name_route(&mut self, index: usize, name: &str) -> Result<(), RouteError> {
        match self.names.get(name) {
            Some(&existing) if existing == index => return Ok(()),
            Some(_) => return Err(RouteError::DuplicateName(name.to_string())),
            None => {}
        }
        let route = Arc::make_mut(&mut self.routes[index]);
        if let Some(previous) = route.name() {
            self.names.remove(previous);
        }
        route.set_name(name.to_string());
        self.names.insert(name.to_string(), index);
        Ok(())
    }
}

impl RouteResolver for Router {
    fn resolve(&self, request: &Request) -> Option<RouteMatch> {
        self.match_request(request)
    }

    fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }
}

/// Handle returned by route registration for fluent configuration.
pub struct RouteRegistration<'r> {
    router: &'r mut Router,
    index: usize,
}

impl RouteRegistration<'_> {
    /// Name the route for reverse URL generation.
    ///
    /// # Errors
    ///
    /// [`RouteError::DuplicateName`] when another route already has this name.
    pub fn name(mut self, name: &str) -> Result<Self, RouteError> {
        self.router.name_route(self.index, name)?;
        Ok(self)
    }

    /// Append route-specific middleware after any group middleware.
    #[must_use]
    pub fn middleware(mut self, aliases: &[&str]) -> Self {
        Arc::make_mut(&mut self.router.routes[self.index]).push_middleware(aliases.iter().copied());
        self
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.router.routes[self.index]
    }
}

/// Builder for [`Router::url`] accepting any displayable parameter value.
pub struct UrlBuilder<'r> {
    router: &'r Router,
    name: String,
    params: HashMap<String, String>,
    query: Vec<(String, String)>,
}

impl UrlBuilder<'_> {
    #[must_use]
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// # Errors
    ///
    /// Same as [`Router::url`].
    pub fn build(&self) -> Result<String, RouteError> {
        self.router.url(&self.name, &self.params, &self.query)
    }
}
