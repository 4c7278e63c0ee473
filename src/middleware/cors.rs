use http::Method;

use super::error_handler::render_error;
use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};

/// CORS (Cross-Origin Resource Sharing) middleware
///
/// Answers preflight `OPTIONS` requests itself and stamps the CORS headers on
/// every response that passes through.
///
/// `Access-Control-Allow-Origin` is `*` when the wildcard is allowed,
/// otherwise the request's `Origin` echoed back when it is on the allow list
/// (with `Vary: Origin` merged into any existing `Vary`). Disallowed origins
/// get no allow-origin header, which browsers treat as a refusal.
///
/// For an allowed origin, errors from inner layers are rendered here and
/// stamped too, so a browser can read a 401 or a 429 and its `Retry-After`.
/// Other errors keep propagating to the outer error handler.
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<Method>,
    expose_headers: Vec<String>,
    max_age: Option<u64>,
}

impl CorsMiddleware {
    /// # Example
    ///
    /// ```rust
    /// use waypoint::middleware::CorsMiddleware;
    /// use http::Method;
    ///
    /// let cors = CorsMiddleware::new(
    ///     vec!["https://example.com".to_string()],
    ///     vec!["Content-Type".to_string()],
    ///     vec![Method::GET, Method::POST],
    /// )
    /// .with_max_age(600);
    /// ```
    #[must_use]
    pub fn new(
        allowed_origins: Vec<String>,
        allowed_headers: Vec<String>,
        allowed_methods: Vec<Method>,
    ) -> Self {
        Self {
            allowed_origins,
            allowed_headers,
            allowed_methods,
            expose_headers: Vec::new(),
            max_age: None,
        }
    }

    /// Seconds a preflight result may be cached by the browser.
    #[must_use]
    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_expose_headers(mut self, headers: Vec<String>) -> Self {
        self.expose_headers = headers;
        self
    }

    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_string());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .any(|o| o.eq_ignore_ascii_case(origin))
            .then(|| origin.to_string())
    }
}

/// Permissive policy: any origin, common methods, `Content-Type` and
/// `Authorization` headers.
impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new(
            vec!["*".into()],
            vec!["Content-Type".into(), "Authorization".into()],
            vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ],
        )
    }
}

impl CorsMiddleware {
    fn stamp(&self, origin: String, res: &mut Response) {
        if origin != "*" {
            res.append_vary("Origin");
        }
        res.set_header("Access-Control-Allow-Origin", origin);

        res.set_header("Access-Control-Allow-Headers", self.allowed_headers.join(", "));

        let methods = self
            .allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        res.set_header("Access-Control-Allow-Methods", methods);

        if !self.expose_headers.is_empty() {
            res.set_header("Access-Control-Expose-Headers", self.expose_headers.join(", "));
        }
        if let Some(max_age) = self.max_age {
            res.set_header("Access-Control-Max-Age", max_age.to_string());
        }
    }
}

impl Middleware for CorsMiddleware {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        let origin = self.allow_origin(request.get_header("Origin"));

        if request.method == Method::OPTIONS {
            let mut preflight = Response::empty(204);
            if let Some(origin) = origin {
                self.stamp(origin, &mut preflight);
            }
            return Ok(preflight);
        }

        let Some(origin) = origin else {
            return next.run(request);
        };
        let request_id = request.request_id;
        let method = request.method.clone();
        let path = request.path.clone();

        let mut response = next
            .run(request)
            .unwrap_or_else(|err| render_error(request_id, &method, &path, &err));
        self.stamp(origin, &mut response);
        Ok(response)
    }
}
