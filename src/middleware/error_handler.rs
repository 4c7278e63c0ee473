use http::Method;
use tracing::{error, warn};

use crate::error::PipelineError;
use crate::ids::RequestId;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};

/// Turns every [`PipelineError`] into its JSON response.
///
/// Place it outermost so nothing escapes as an `Err`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorHandlerMiddleware;

/// Log `err` and render it with the request's `X-Request-Id`.
pub(super) fn render_error(
    request_id: RequestId,
    method: &Method,
    path: &str,
    err: &PipelineError,
) -> Response {
    let status = err.status();
    if err.is_client_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            error = %err,
            "Request rejected"
        );
    } else {
        error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            error = ?err,
            "Request failed"
        );
    }
    err.to_response()
        .with_header("X-Request-Id", request_id.to_string())
}

impl Middleware for ErrorHandlerMiddleware {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        let request_id = request.request_id;
        let method = request.method.clone();
        let path = request.path.clone();

        next.run(request)
            .or_else(|err| Ok(render_error(request_id, &method, &path, &err)))
    }
}
