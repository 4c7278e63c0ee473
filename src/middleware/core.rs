use std::time::{Duration, Instant};

use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};

/// Hook-style middleware: inspect before, adjust after.
///
/// Every `Interceptor` is a [`Middleware`]. Returning `Some` from `before`
/// short-circuits the rest of the chain; `after` still runs on that response.
/// `after` sees responses only, never errors.
pub trait Interceptor: Send + Sync {
    fn before(&self, _req: &Request) -> Option<Response> {
        None
    }

    fn after(&self, _req: &Request, _res: &mut Response, _latency: Duration) {}
}

impl<T: Interceptor> Middleware for T {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        let start = Instant::now();
        if let Some(mut early) = self.before(&request) {
            self.after(&request, &mut early, start.elapsed());
            return Ok(early);
        }

        let seen = request.clone();
        let mut response = next.run(request)?;
        self.after(&seen, &mut response, start.elapsed());
        Ok(response)
    }
}
