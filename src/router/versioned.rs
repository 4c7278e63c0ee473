//! API version registry and version-aware matching.
//!
//! [`VersionedRouter`] wraps a [`Router`] and adds:
//!
//! - a registry of [`ApiVersion`] metadata (deprecation flag, message, sunset date)
//! - `version(id, ..)` groups registering routes under `/{id}`
//! - default-version fallback: an un-prefixed path that matches nothing is
//!   retried as `/{default}{path}`, so clients can omit the version segment
//!
//! Version detection on paths is done by [`PathVersion`] for every match path.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use http::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::core::{RouteMatch, RouteResolver, Router};
use super::route::Route;
use crate::error::RouteError;
use crate::message::Request;

/// Lifecycle metadata for one API version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    version: String,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    deprecation_message: Option<String>,
    /// ISO-8601 date after which the version may be removed
    #[serde(default)]
    sunset_date: Option<String>,
}

impl ApiVersion {
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        deprecated: bool,
        deprecation_message: Option<String>,
        sunset_date: Option<String>,
    ) -> Self {
        Self {
            version: version.into(),
            deprecated,
            deprecation_message,
            sunset_date,
        }
    }

    /// A current (non-deprecated) version.
    #[must_use]
    pub fn current(version: impl Into<String>) -> Self {
        Self::new(version, false, None, None)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    #[must_use]
    pub fn deprecation_message(&self) -> Option<&str> {
        self.deprecation_message.as_deref()
    }

    #[must_use]
    pub fn sunset_date(&self) -> Option<&str> {
        self.sunset_date.as_deref()
    }

    /// Value of the `Deprecation` header, present only for deprecated versions.
    #[must_use]
    pub fn deprecation_header(&self) -> Option<&'static str> {
        self.deprecated.then_some("true")
    }

    /// Human-readable deprecation notice including the sunset date.
    #[must_use]
    pub fn deprecation_info(&self) -> Option<String> {
        if !self.deprecated {
            return None;
        }
        let mut info = self
            .deprecation_message
            .clone()
            .unwrap_or_else(|| format!("API version {} is deprecated", self.version));
        if let Some(sunset) = &self.sunset_date {
            info.push_str(&format!(" (sunset: {sunset})"));
        }
        Some(info)
    }

    /// Value of the `Sunset` header (RFC 8594).
    #[must_use]
    pub fn sunset_header(&self) -> Option<&str> {
        if self.deprecated {
            self.sunset_date.as_deref()
        } else {
            None
        }
    }
}

/// A leading `/v<digits>` path segment.
///
/// ```
/// use waypoint::router::PathVersion;
///
/// let v = PathVersion::parse("/v2/api/clients").unwrap();
/// assert_eq!(v.id(), "v2");
/// assert_eq!(v.rest(), "/api/clients");
/// assert!(PathVersion::parse("/api/v2").is_none());
/// assert!(PathVersion::parse("/video").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathVersion<'a> {
    id: &'a str,
    rest: &'a str,
}

impl<'a> PathVersion<'a> {
    #[must_use]
    pub fn parse(path: &'a str) -> Option<Self> {
        let after_slash = path.strip_prefix('/')?;
        let digits = after_slash.strip_prefix('v')?;
        let digit_len = digits.bytes().take_while(u8::is_ascii_digit).count();
        if digit_len == 0 {
            return None;
        }
        let id_len = 1 + digit_len;
        let rest = &after_slash[id_len..];
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        Some(Self {
            id: &after_slash[..id_len],
            rest,
        })
    }

    /// Version id including the `v`, e.g. `v1`.
    #[must_use]
    pub fn id(&self) -> &'a str {
        self.id
    }

    /// Remainder of the path after the version segment.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        self.rest
    }

    /// `path` with `/{version}` prepended.
    #[must_use]
    pub fn prefixed(version: &str, path: &str) -> String {
        format!("/{version}{path}")
    }
}

/// Router with an API version registry and default-version fallback.
///
/// Dereferences to [`Router`] for route registration, groups and URL
/// generation; matching goes through the version-aware
/// [`VersionedRouter::match_route`].
#[derive(Debug, Clone, Default)]
pub struct VersionedRouter {
    router: Router,
    versions: HashMap<String, Arc<ApiVersion>>,
    default_version: Option<String>,
}

impl VersionedRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) version metadata.
    pub fn register_version(
        &mut self,
        version: &str,
        deprecated: bool,
        message: Option<&str>,
        sunset_date: Option<&str>,
    ) -> Arc<ApiVersion> {
        let api_version = Arc::new(ApiVersion::new(
            version,
            deprecated,
            message.map(str::to_string),
            sunset_date.map(str::to_string),
        ));
        self.insert_version(Arc::clone(&api_version));
        api_version
    }

    /// Register prebuilt version metadata, replacing any with the same id.
    pub fn insert_version(&mut self, version: Arc<ApiVersion>) {
        debug!(
            version = %version.version(),
            deprecated = version.is_deprecated(),
            sunset = ?version.sunset_date(),
            "API version registered"
        );
        self.versions.insert(version.version().to_string(), version);
    }

    /// # Errors
    ///
    /// [`RouteError::UnknownVersion`] if the version was never registered.
    pub fn set_default_version(&mut self, version: &str) -> Result<(), RouteError> {
        if !self.versions.contains_key(version) {
            return Err(RouteError::UnknownVersion(version.to_string()));
        }
        self.default_version = Some(version.to_string());
        Ok(())
    }

    #[must_use]
    pub fn default_version(&self) -> Option<&Arc<ApiVersion>> {
        self.default_version
            .as_deref()
            .and_then(|v| self.versions.get(v))
    }

    #[must_use]
    pub fn get_version(&self, version: &str) -> Option<&Arc<ApiVersion>> {
        self.versions.get(version)
    }

    #[must_use]
    pub fn versions(&self) -> Vec<&Arc<ApiVersion>> {
        let mut versions: Vec<_> = self.versions.values().collect();
        versions.sort_by(|a, b| a.version().cmp(b.version()));
        versions
    }

    /// Register the callback's routes under `/{version}`.
    pub fn version<F>(&mut self, version: &str, middleware: &[&str], callback: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Router) -> Result<(), RouteError>,
    {
        self.router
            .group(&format!("/{version}"), middleware, callback)
    }

    /// Match with version resolution and default-version fallback.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        if let Some(mut found) = self.router.match_route(method, path) {
            if let Some(version) = PathVersion::parse(path).and_then(|pv| self.versions.get(pv.id())) {
                found.set_version(Arc::clone(version));
            }
            return Some(found);
        }

        let default = self.default_version.as_deref()?;
        if PathVersion::parse(path).is_some() {
            return None;
        }
        let version = self.versions.get(default)?;
        let fallback_path = PathVersion::prefixed(default, path);
        debug!(
            method = %method,
            path = %path,
            fallback_path = %fallback_path,
            "Retrying match with default API version"
        );
        let mut found = self.router.match_route(method, &fallback_path)?;
        found.set_version(Arc::clone(version));
        Some(found)
    }

    #[must_use]
    pub fn match_request(&self, request: &Request) -> Option<RouteMatch> {
        self.match_route(&request.method, &request.path)
            .map(|mut m| {
                m.query = request.query.clone();
                m
            })
    }

    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}

impl Deref for VersionedRouter {
    type Target = Router;

    fn deref(&self) -> &Router {
        &self.router
    }
}

impl DerefMut for VersionedRouter {
    fn deref_mut(&mut self) -> &mut Router {
        &mut self.router
    }
}

impl RouteResolver for VersionedRouter {
    fn resolve(&self, request: &Request) -> Option<RouteMatch> {
        self.match_request(request)
    }

    fn routes(&self) -> &[Arc<Route>] {
        self.router.routes()
    }
}
