use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::router::Route;

/// `max_attempts` per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub max_attempts: u64,
    pub window_secs: u64,
}

impl RateLimitRule {
    #[must_use]
    pub fn new(max_attempts: u64, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window_secs,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Counter namespace a limit was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitScope {
    Route(String),
    Group(String),
    Global,
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitScope::Route(name) => write!(f, "route:{name}"),
            RateLimitScope::Group(prefix) => write!(f, "group:{prefix}"),
            RateLimitScope::Global => f.write_str("global"),
        }
    }
}

/// Which limit applies to which request.
///
/// Precedence: a rule for the matched route's name, then the rule of the
/// longest group prefix covering the route pattern (or the request path when
/// nothing matched), then the global rule. No rule means no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    pub global: Option<RateLimitRule>,
    /// Rules keyed by path prefix, e.g. `/api`.
    pub groups: BTreeMap<String, RateLimitRule>,
    /// Rules keyed by route name.
    pub routes: BTreeMap<String, RateLimitRule>,
}

impl RateLimitPolicy {
    /// A policy with only a global rule.
    #[must_use]
    pub fn global(rule: RateLimitRule) -> Self {
        Self {
            global: Some(rule),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_group(mut self, prefix: impl Into<String>, rule: RateLimitRule) -> Self {
        self.groups.insert(prefix.into(), rule);
        self
    }

    #[must_use]
    pub fn with_route(mut self, name: impl Into<String>, rule: RateLimitRule) -> Self {
        self.routes.insert(name.into(), rule);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.groups.is_empty() && self.routes.is_empty()
    }

    /// Resolve the applicable rule for a request.
    #[must_use]
    pub fn resolve(&self, route: Option<&Route>, path: &str) -> Option<(RateLimitScope, RateLimitRule)> {
        if let Some(rule) = route
            .and_then(Route::name)
            .and_then(|name| self.routes.get(name).map(|rule| (name, rule)))
            .map(|(name, rule)| (RateLimitScope::Route(name.to_string()), *rule))
        {
            return Some(rule);
        }

        let target = route.map_or(path, Route::pattern);
        let group = self
            .groups
            .iter()
            .filter(|(prefix, _)| covers(prefix, target))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((prefix, rule)) = group {
            return Some((RateLimitScope::Group(prefix.clone()), *rule));
        }

        self.global.map(|rule| (RateLimitScope::Global, rule))
    }
}

/// Whether `prefix` covers `path` on a segment boundary.
fn covers(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
