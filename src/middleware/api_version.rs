use std::time::Duration;

use tracing::debug;

use super::Interceptor;
use crate::message::{Request, Response};

/// Advertises the resolved API version and its deprecation status.
///
/// Reads the version from the route match the dispatcher attached to the
/// request. Requests without a version are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiVersionMiddleware;

impl Interceptor for ApiVersionMiddleware {
    fn after(&self, req: &Request, res: &mut Response, _latency: Duration) {
        let Some(version) = req.attributes.route_match().and_then(|m| m.version()) else {
            return;
        };

        res.set_header("X-API-Version", version.version().to_string());

        if let Some(deprecation) = version.deprecation_header() {
            res.set_header("Deprecation", deprecation.to_string());
            if let Some(info) = version.deprecation_info() {
                res.set_header("X-API-Deprecation-Info", info);
            }
            if let Some(sunset) = version.sunset_header() {
                res.set_header("Sunset", sunset.to_string());
            }
            debug!(
                request_id = %req.request_id,
                version = %version.version(),
                sunset = ?version.sunset_date(),
                "Deprecated API version served"
            );
        }
    }
}
