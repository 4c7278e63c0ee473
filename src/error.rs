//! Error taxonomy for the request pipeline.
//!
//! Two families live here:
//!
//! - [`RouteError`] - boot-time and programmer errors raised while building the
//!   route table or generating URLs. These never reach a client.
//! - [`PipelineError`] - request-facing failures raised by middleware or
//!   handlers. Every variant maps to exactly one HTTP status and renders to a
//!   single well-formed JSON [`Response`] via [`PipelineError::to_response`].
//!
//! A missing route is not an error of the router itself: matching returns
//! `None` and the dispatcher translates that into [`PipelineError::RouteNotFound`].

use std::collections::BTreeMap;

use serde_json::json;

use crate::message::Response;

/// Errors raised while registering routes, versions or generating URLs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The path template could not be compiled.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    /// A route with this name is already registered.
    #[error("route name `{0}` is already registered")]
    DuplicateName(String),
    /// URL generation was asked for a name that was never registered.
    #[error("no route named `{0}`")]
    UnknownRoute(String),
    /// URL generation could not resolve a required placeholder.
    #[error("missing required parameter `{parameter}` for route `{route}`")]
    MissingParameter { route: String, parameter: String },
    /// The API version was never registered.
    #[error("API version `{0}` is not registered")]
    UnknownVersion(String),
}

/// Request-facing failures produced inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("too many requests, retry after {retry_after} seconds")]
    RateLimitExceeded {
        /// Seconds until the current window resets.
        retry_after: u64,
        limit: u64,
        /// Unix timestamp of the window reset.
        reset_at: u64,
    },

    #[error("invalid field `{field}`")]
    InvalidField { field: String, available: Vec<String> },

    #[error("the given data was invalid")]
    ValidationFailed { errors: BTreeMap<String, Vec<String>> },

    #[error("handler `{0}` is not registered")]
    HandlerNotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// HTTP status code for this error kind.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            PipelineError::RouteNotFound { .. } => 404,
            PipelineError::Unauthorized(_) => 401,
            PipelineError::RateLimitExceeded { .. } => 429,
            PipelineError::InvalidField { .. } => 400,
            PipelineError::ValidationFailed { .. } => 422,
            PipelineError::HandlerNotFound(_) | PipelineError::Internal(_) => 500,
        }
    }

    /// Whether the failure is the caller's fault (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Render the error as a single JSON response.
    ///
    /// Internal failures never leak their message into the body. Rate-limit
    /// rejections always carry `Retry-After` alongside the rate-limit headers.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let status = self.status();
        let body = match self {
            PipelineError::HandlerNotFound(_) | PipelineError::Internal(_) => {
                json!({ "error": "Internal Server Error" })
            }
            PipelineError::InvalidField { field, available } => json!({
                "error": self.to_string(),
                "field": field,
                "available_fields": available,
            }),
            PipelineError::ValidationFailed { errors } => json!({
                "error": self.to_string(),
                "errors": errors,
            }),
            PipelineError::RateLimitExceeded { retry_after, .. } => json!({
                "error": "Too Many Requests",
                "retry_after": retry_after,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        let mut response = Response::json(status, body);
        match self {
            PipelineError::RateLimitExceeded {
                retry_after,
                limit,
                reset_at,
            } => {
                response.set_header("Retry-After", retry_after.to_string());
                response.set_header("X-RateLimit-Limit", limit.to_string());
                response.set_header("X-RateLimit-Remaining", "0".to_string());
                response.set_header("X-RateLimit-Reset", reset_at.to_string());
            }
            PipelineError::Unauthorized(_) => {
                response.set_header("WWW-Authenticate", "Bearer".to_string());
            }
            _ => {}
        }
        response
    }

    /// Convenience constructor for a single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), vec![message.into()]);
        PipelineError::ValidationFailed { errors }
    }
}
