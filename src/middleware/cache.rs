use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use http::Method;
use serde_json::Value;
use tracing::debug;

use super::filter_fields;
use crate::cache::{format_http_date, CacheDirectives, CacheManager};
use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};

/// Statuses that get `Cache-Control` / `Vary`.
const CACHEABLE_STATUSES: &[u16] = &[404, 405, 410, 414, 501];

/// Conditional GET support.
///
/// Successful `GET`/`HEAD` responses get an `ETag` computed from their body
/// and, when enabled, a `Last-Modified` equal to the first time that ETag
/// was seen for the path. A request whose `If-None-Match` (or, failing that,
/// `If-Modified-Since`) matches is answered with `304 Not Modified`, an empty
/// body and the same validators. Responses marked `Cache-Control: no-cache`
/// are left untouched.
///
/// When an outer [`FieldFilterMiddleware`](super::FieldFilterMiddleware) has
/// recorded a field selection on the request, the body is projected here
/// first, so the ETag is the digest of the representation actually served and
/// each selection validates separately.
pub struct CacheMiddleware {
    cache: Arc<CacheManager>,
    directives: CacheDirectives,
    last_modified: bool,
    validator_ttl: Duration,
}

impl CacheMiddleware {
    #[must_use]
    pub fn new(cache: Arc<CacheManager>, directives: CacheDirectives) -> Self {
        Self {
            cache,
            directives,
            last_modified: false,
            validator_ttl: Duration::from_secs(86_400),
        }
    }

    /// Also emit and honour `Last-Modified`, remembering first-seen times
    /// for `ttl`.
    #[must_use]
    pub fn with_last_modified(mut self, ttl: Duration) -> Self {
        self.last_modified = true;
        self.validator_ttl = ttl;
        self
    }

    fn is_cacheable_status(status: u16) -> bool {
        (200..400).contains(&status) || CACHEABLE_STATUSES.contains(&status)
    }

    fn opts_out(response: &Response) -> bool {
        response.get_header("Cache-Control").is_some_and(|v| {
            v.split(',')
                .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
        })
    }

    fn first_seen(&self, path: &str, etag: &str) -> Result<u64, PipelineError> {
        let key = format!("last_modified:{path}:{etag}");
        let cache = &self.cache;
        cache
            .remember(&key, self.validator_ttl, || {
                cache
                    .now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0)
            })
            .map_err(|e| PipelineError::Internal(e.into()))
    }
}

impl Middleware for CacheMiddleware {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        if request.method != Method::GET && request.method != Method::HEAD {
            return next.run(request);
        }

        let conditional = request.clone();
        let mut response = next.run(request)?;
        if Self::opts_out(&response) {
            return Ok(response);
        }

        if response.is_success() {
            if let Some(fields) = conditional.attributes.fields() {
                if matches!(response.body, Value::Object(_) | Value::Array(_)) {
                    response.body = filter_fields(&response.body, fields)?;
                }
            }

            let etag = self.cache.etag_for(&response);
            response.set_header("ETag", etag.clone());

            let last_modified = if self.last_modified {
                let secs = self.first_seen(&conditional.path, &etag)?;
                let at = UNIX_EPOCH + Duration::from_secs(secs);
                response.set_header("Last-Modified", format_http_date(at));
                Some(at)
            } else {
                None
            };

            let not_modified = if conditional.get_header("If-None-Match").is_some() {
                self.cache.is_not_modified(&conditional, &etag)
            } else {
                last_modified.is_some_and(|at| self.cache.check_last_modified(&conditional, at))
            };

            if not_modified {
                debug!(
                    request_id = %conditional.request_id,
                    path = %conditional.path,
                    etag = %etag,
                    "Conditional request matched, answering 304"
                );
                response = response.with_status(304).with_body(Value::Null);
                response.remove_header("Content-Type");
                response.remove_header("Content-Length");
            }
        }

        if Self::is_cacheable_status(response.status) {
            self.cache.set_cache_headers(&mut response, &self.directives);
        }
        Ok(response)
    }
}
