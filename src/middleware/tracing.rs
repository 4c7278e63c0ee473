use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};

/// Request span plus start/finish logs.
///
/// The span stays entered for the whole downstream call, so every event
/// logged by inner middleware and the handler carries the request id.
pub struct TracingMiddleware {
    slow_threshold: Duration,
}

impl TracingMiddleware {
    #[must_use]
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Middleware for TracingMiddleware {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        let span = info_span!(
            "request",
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
        );
        let _entered = span.enter();

        debug!(remote_addr = ?request.remote_addr, "Request started");
        let start = Instant::now();
        let result = next.run(request);
        let latency = start.elapsed();
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);

        let status = match &result {
            Ok(res) => res.status,
            Err(err) => err.status(),
        };
        info!(status, latency_ms, "Request completed");
        if latency > self.slow_threshold {
            warn!(
                status,
                latency_ms,
                threshold_ms = u64::try_from(self.slow_threshold.as_millis()).unwrap_or(u64::MAX),
                "Slow request"
            );
        }
        result
    }
}
