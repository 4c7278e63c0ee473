use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};
use crate::security::TokenVerifier;

/// Bearer-token authentication.
///
/// On success the `sub` claim becomes the request's user id and the full
/// claims are attached for downstream middleware and handlers.
pub struct AuthMiddleware {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthMiddleware {
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    let header = request.get_header("Authorization")?;
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn subject(claims: &Value) -> Option<String> {
    match claims.get("sub")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Middleware for AuthMiddleware {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        let Some(token) = bearer_token(&request) else {
            debug!(request_id = %request.request_id, "Missing bearer token");
            return Err(PipelineError::Unauthorized("missing bearer token".into()));
        };

        let claims = self.verifier.verify_token(token).map_err(|e| {
            warn!(request_id = %request.request_id, error = %e, "Token verification failed");
            PipelineError::Unauthorized(e.to_string())
        })?;

        let Some(user_id) = subject(&claims) else {
            warn!(request_id = %request.request_id, "Verified token has no subject");
            return Err(PipelineError::Unauthorized("token has no subject".into()));
        };

        debug!(request_id = %request.request_id, user_id = %user_id, "Request authenticated");
        next.run(request.with_user(user_id, Some(claims)))
    }
}
