//! # Configuration Module
//!
//! One immutable [`PipelineConfig`] value, loaded at boot from YAML or TOML
//! and validated before anything is built from it. Components never read the
//! environment themselves; they receive the pieces of this value they need.
//!
//! ```yaml
//! logging:
//!   level: info
//!   format: pretty
//! rate_limit:
//!   global: { max_attempts: 1000, window_secs: 60 }
//!   groups:
//!     /api/admin: { max_attempts: 20, window_secs: 60 }
//!   routes:
//!     auth.login: { max_attempts: 5, window_secs: 300 }
//! cache:
//!   max_age: 600
//!   vary: [Accept, Authorization]
//! api:
//!   default_version: v2
//!   versions:
//!     - { version: v1, deprecated: true, sunset_date: "2025-12-31" }
//!     - { version: v2 }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use http::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{CacheDirectives, CacheManager};
use crate::error::RouteError;
use crate::logging::LoggingSettings;
use crate::middleware::{
    AuthMiddleware, CacheMiddleware, CorsMiddleware, FieldFilterMiddleware, RateLimitMiddleware,
    TracingMiddleware,
};
use crate::rate_limit::{RateLimitPolicy, RateLimitRule, RateLimiter};
use crate::router::{ApiVersion, PathVersion, VersionedRouter};
use crate::security::JwtVerifier;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub logging: LoggingSettings,
    pub tracing: TracingSettings,
    pub rate_limit: RateLimitPolicy,
    pub cache: CacheSettings,
    pub cors: CorsSettings,
    pub auth: AuthSettings,
    pub fields: FieldSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSettings {
    /// Requests slower than this are logged at warn.
    pub slow_request_ms: u64,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            slow_request_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(flatten)]
    pub directives: CacheDirectives,
    /// Emit and honour `Last-Modified`.
    pub last_modified: bool,
    /// How long first-seen times are remembered.
    pub validator_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directives: CacheDirectives::default(),
            last_modified: false,
            validator_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age: Option<u64>,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".into()],
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            expose_headers: Vec::new(),
            max_age: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 secret; auth is disabled without one.
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: None,
            audience: None,
            leeway_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Query parameter carrying the field list.
    pub param: String,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            param: "fields".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub versions: Vec<ApiVersion>,
    pub default_version: Option<String>,
}

impl ApiSettings {
    /// Register the versions and default version on `router`.
    ///
    /// # Errors
    ///
    /// [`RouteError::UnknownVersion`] when the default is not among the versions.
    pub fn apply(&self, router: &mut VersionedRouter) -> Result<(), RouteError> {
        for version in &self.versions {
            router.insert_version(Arc::new(version.clone()));
        }
        if let Some(default) = &self.default_version {
            router.set_default_version(default)?;
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Load from a `.yaml`/`.yml` or `.toml` file and validate.
    ///
    /// # Errors
    ///
    /// Unreadable file, unknown extension, parse failure or invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&raw),
            Some("toml") => Self::from_toml_str(&raw),
            other => bail!("unsupported config format {other:?} for {}", path.display()),
        }
        .with_context(|| format!("invalid config {}", path.display()))?;

        info!(
            path = %path.display(),
            versions = config.api.versions.len(),
            rate_limited_routes = config.rate_limit.routes.len(),
            rate_limited_groups = config.rate_limit.groups.len(),
            "Pipeline configuration loaded"
        );
        Ok(config)
    }

    /// # Errors
    ///
    /// Parse failure or invalid values.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw).context("failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Parse failure or invalid values.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// The first invalid value found.
    pub fn validate(&self) -> Result<()> {
        if let Some(rule) = &self.rate_limit.global {
            validate_rule("rate_limit.global", rule)?;
        }
        for (prefix, rule) in &self.rate_limit.groups {
            ensure!(
                prefix.starts_with('/'),
                "rate_limit.groups: prefix `{prefix}` must start with '/'"
            );
            validate_rule(&format!("rate_limit.groups.{prefix}"), rule)?;
        }
        for (name, rule) in &self.rate_limit.routes {
            ensure!(!name.is_empty(), "rate_limit.routes: route name must not be empty");
            validate_rule(&format!("rate_limit.routes.{name}"), rule)?;
        }

        if self.cache.last_modified {
            ensure!(
                self.cache.validator_ttl_secs > 0,
                "cache.validator_ttl_secs must be greater than zero"
            );
        }

        for method in &self.cors.allowed_methods {
            method
                .parse::<Method>()
                .with_context(|| format!("cors.allowed_methods: invalid method `{method}`"))?;
        }

        for version in &self.api.versions {
            let id = version.version();
            let probe = PathVersion::prefixed(id, "");
            ensure!(
                PathVersion::parse(&probe).is_some_and(|pv| pv.id() == id),
                "api.versions: `{id}` is not of the form v<digits>"
            );
        }
        if let Some(default) = &self.api.default_version {
            ensure!(
                self.api.versions.iter().any(|v| v.version() == default),
                "api.default_version `{default}` is not among api.versions"
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn tracing_middleware(&self) -> TracingMiddleware {
        TracingMiddleware::new(Duration::from_millis(self.tracing.slow_request_ms))
    }

    /// `None` when no rate-limit rule is configured.
    #[must_use]
    pub fn rate_limit_middleware(&self, limiter: RateLimiter) -> Option<RateLimitMiddleware> {
        (!self.rate_limit.is_empty())
            .then(|| RateLimitMiddleware::new(limiter, self.rate_limit.clone()))
    }

    #[must_use]
    pub fn cache_middleware(&self, cache: Arc<CacheManager>) -> CacheMiddleware {
        let middleware = CacheMiddleware::new(cache, self.cache.directives.clone());
        if self.cache.last_modified {
            middleware.with_last_modified(Duration::from_secs(self.cache.validator_ttl_secs))
        } else {
            middleware
        }
    }

    /// # Errors
    ///
    /// An allowed method that does not parse; [`validate`](Self::validate)
    /// rejects those up front.
    pub fn cors_middleware(&self) -> Result<CorsMiddleware> {
        let methods = self
            .cors
            .allowed_methods
            .iter()
            .map(|m| m.parse::<Method>().with_context(|| format!("invalid method `{m}`")))
            .collect::<Result<Vec<_>>>()?;
        let mut cors = CorsMiddleware::new(
            self.cors.allowed_origins.clone(),
            self.cors.allowed_headers.clone(),
            methods,
        )
        .with_expose_headers(self.cors.expose_headers.clone());
        if let Some(max_age) = self.cors.max_age {
            cors = cors.with_max_age(max_age);
        }
        Ok(cors)
    }

    /// `None` when no JWT secret is configured.
    #[must_use]
    pub fn auth_middleware(&self) -> Option<AuthMiddleware> {
        let secret = self.auth.jwt_secret.as_deref()?;
        let mut verifier = JwtVerifier::hs256(secret.as_bytes()).leeway(self.auth.leeway_secs);
        if let Some(issuer) = &self.auth.issuer {
            verifier = verifier.issuer(issuer.clone());
        }
        if let Some(audience) = &self.auth.audience {
            verifier = verifier.audience(audience.clone());
        }
        Some(AuthMiddleware::new(Arc::new(verifier)))
    }

    #[must_use]
    pub fn field_filter_middleware(&self) -> FieldFilterMiddleware {
        FieldFilterMiddleware::new(self.fields.param.clone())
    }
}

fn validate_rule(scope: &str, rule: &RateLimitRule) -> Result<()> {
    ensure!(rule.max_attempts > 0, "{scope}: max_attempts must be greater than zero");
    ensure!(rule.window_secs > 0, "{scope}: window_secs must be greater than zero");
    Ok(())
}
