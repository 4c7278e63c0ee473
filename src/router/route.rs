use std::collections::HashMap;
use std::fmt;

use http::Method;

use super::pattern::CompiledPattern;
use crate::error::RouteError;

/// A single method + pattern + handler binding.
///
/// The pattern is compiled when the route is created; matching never
/// recompiles it.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: String,
    handler: String,
    middleware: Vec<String>,
    name: Option<String>,
    compiled: CompiledPattern,
}

impl Route {
    /// Create a route, compiling `pattern`.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when the template is malformed.
    pub fn new(
        method: Method,
        pattern: impl Into<String>,
        handler: impl Into<String>,
    ) -> Result<Self, RouteError> {
        let pattern = pattern.into();
        let compiled = CompiledPattern::compile(&pattern)?;
        Ok(Self {
            method,
            pattern,
            handler: handler.into(),
            middleware: Vec::new(),
            name: None,
            compiled,
        })
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full pattern, including any group prefix.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Id of the handler the dispatcher invokes for this route.
    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Middleware aliases, outermost first.
    #[must_use]
    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        self.compiled.param_names()
    }

    /// Whether this route accepts `method` and the whole of `path`.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method == *method && self.compiled.is_match(path)
    }

    /// Path parameters for `path`; empty when the path does not match.
    #[must_use]
    pub fn extract_params(&self, path: &str) -> HashMap<String, String> {
        self.compiled.captures(path).unwrap_or_default()
    }

    /// Match and extract in one pass.
    pub(crate) fn try_match(&self, method: &Method, path: &str) -> Option<HashMap<String, String>> {
        if self.method != *method {
            return None;
        }
        self.compiled.captures(path)
    }

    /// Fill the pattern's placeholders from `params`.
    ///
    /// # Errors
    ///
    /// [`RouteError::MissingParameter`] when a required placeholder has no value.
    pub fn build_path(&self, params: &HashMap<String, String>) -> Result<String, RouteError> {
        self.compiled
            .build(params)
            .map_err(|parameter| RouteError::MissingParameter {
                route: self.name.clone().unwrap_or_else(|| self.pattern.clone()),
                parameter,
            })
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub(crate) fn push_middleware<I, S>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(aliases.into_iter().map(Into::into));
    }

    /// Key identifying the route's handler chain inside a dispatcher.
    pub(crate) fn chain_key(&self) -> String {
        format!("{} {}", self.method, self.pattern)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.method, self.pattern, self.handler)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}
