#![allow(dead_code)]

pub mod fixtures {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use waypoint::cache::CacheManager;
    use waypoint::clock::{Clock, ManualClock};
    use waypoint::message::{Request, Response};
    use waypoint::pipeline::{handler_fn, Middleware, Next, RequestHandler};
    use waypoint::rate_limit::RateLimiter;
    use waypoint::PipelineError;

    /// Unix time every manual clock starts at.
    pub const START: u64 = 1_700_000_000;

    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at_unix(START))
    }

    pub fn limiter(clock: &Arc<ManualClock>) -> RateLimiter {
        RateLimiter::with_clock(Arc::clone(clock) as Arc<dyn Clock>)
    }

    pub fn cache(clock: &Arc<ManualClock>) -> Arc<CacheManager> {
        Arc::new(CacheManager::with_clock(Arc::clone(clock) as Arc<dyn Clock>))
    }

    /// Handler answering 200 with a fixed JSON body.
    pub fn json_handler(body: Value) -> impl RequestHandler + 'static {
        handler_fn(move |_req| Ok(Response::ok(body.clone())))
    }

    /// Handler describing what reached it: route, params, version and user.
    pub fn echo_handler() -> impl RequestHandler + 'static {
        handler_fn(|req| {
            let route_match = req.attributes.route_match();
            Ok(Response::ok(json!({
                "handler": route_match.map(|m| m.handler_name().to_string()),
                "params": route_match.map(|m| m.params.clone()),
                "version": route_match.and_then(|m| m.version()).map(|v| v.version().to_string()),
                "user": req.attributes.user_id(),
            })))
        })
    }

    /// Middleware appending `{label}:in` / `{label}:out` to a shared log.
    pub struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        pub fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                label,
                log: Arc::clone(log),
            }
        }
    }

    impl Middleware for Recorder {
        fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
            self.log.lock().push(format!("{}:in", self.label));
            let result = next.run(request);
            self.log.lock().push(format!("{}:out", self.label));
            result
        }
    }
}

pub mod tokens {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    pub const SECRET: &[u8] = b"integration-secret";

    /// 2100-01-01, far enough to never expire during a test run.
    pub const FAR_FUTURE: u64 = 4_102_444_800;

    pub fn sign(claims: &Value) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    pub fn for_user(sub: &str) -> String {
        sign(&json!({ "sub": sub, "exp": FAR_FUTURE }))
    }
}

pub mod temp_files {
    use std::io::Write;

    use tempfile::NamedTempFile;

    /// Write `content` to a temporary file with the given extension.
    pub fn with_extension(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("waypoint_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }
}
