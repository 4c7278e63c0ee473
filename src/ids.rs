use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Per-request correlation id backed by a ULID.
///
/// Taken from an inbound `X-Request-Id` header when it parses as a ULID,
/// otherwise freshly generated.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.trim().parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_valid_header() {
        let id = RequestId::new();
        let text = id.to_string();
        assert_eq!(RequestId::from_header_or_new(Some(&text)), id);
    }

    #[test]
    fn replaces_garbage_header() {
        let id = RequestId::from_header_or_new(Some("not-a-ulid"));
        assert_eq!(id.to_string().len(), 26);
    }
}
