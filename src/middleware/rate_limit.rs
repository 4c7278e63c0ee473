use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};
use crate::rate_limit::{RateLimitPolicy, RateLimitRule, RateLimiter};

/// Fixed-window rate limiting per caller and scope.
///
/// Callers are identified by authenticated user id when an auth layer ran
/// first, otherwise by peer address. The applicable limit comes from the
/// [`RateLimitPolicy`]; requests no rule covers pass untouched.
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
    policy: RateLimitPolicy,
}

impl RateLimitMiddleware {
    #[must_use]
    pub fn new(limiter: RateLimiter, policy: RateLimitPolicy) -> Self {
        Self { limiter, policy }
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Caller identity: `user:{id}`, `ip:{addr}` or `ip:unknown`.
    #[must_use]
    pub fn identity(request: &Request) -> String {
        if let Some(user) = request.attributes.user_id() {
            return format!("user:{user}");
        }
        match request.remote_addr {
            Some(addr) => format!("ip:{addr}"),
            None => "ip:unknown".to_string(),
        }
    }

    fn exceeded(&self, key: &str, rule: &RateLimitRule) -> PipelineError {
        PipelineError::RateLimitExceeded {
            retry_after: self.limiter.available_in(key),
            limit: rule.max_attempts,
            reset_at: self.limiter.reset_at(key),
        }
    }
}

impl Middleware for RateLimitMiddleware {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        let route = request.attributes.route_match().map(|m| m.route.as_ref());
        let Some((scope, rule)) = self.policy.resolve(route, &request.path) else {
            return next.run(request);
        };

        let identity = Self::identity(&request);
        let key = format!("{scope}|{identity}");

        if self.limiter.too_many_attempts(&key, rule.max_attempts) {
            warn!(
                request_id = %request.request_id,
                key = %key,
                limit = rule.max_attempts,
                "Rate limit exceeded"
            );
            return Err(self.exceeded(&key, &rule));
        }

        let count = self.limiter.hit(&key, rule.window());
        if count > rule.max_attempts {
            warn!(
                request_id = %request.request_id,
                key = %key,
                count,
                limit = rule.max_attempts,
                "Rate limit exceeded by concurrent hit"
            );
            return Err(self.exceeded(&key, &rule));
        }
        debug!(key = %key, count, limit = rule.max_attempts, "Rate limit hit recorded");

        let mut response = next.run(request)?;
        response.set_header("X-RateLimit-Limit", rule.max_attempts.to_string());
        response.set_header(
            "X-RateLimit-Remaining",
            rule.max_attempts.saturating_sub(count).to_string(),
        );
        response.set_header("X-RateLimit-Reset", self.limiter.reset_at(&key).to_string());
        Ok(response)
    }
}
