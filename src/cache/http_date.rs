//! IMF-fixdate formatting and parsing for `Last-Modified` / `If-Modified-Since`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format as `Sun, 06 Nov 1994 08:49:37 GMT`.
#[must_use]
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(IMF_FIXDATE).to_string()
}

/// Parse an HTTP-date; `None` when malformed.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

/// Drop sub-second precision; HTTP dates cannot carry it.
#[must_use]
pub fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    UNIX_EPOCH + Duration::from_secs(secs)
}
