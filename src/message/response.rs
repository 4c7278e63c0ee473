use std::sync::Arc;

use serde_json::Value;

use super::{find_header, replace_header, HeaderVec};

/// Response produced by a handler or short-circuiting middleware.
///
/// The body is JSON; `Value::Null` is an empty body and a `Value::String` is
/// sent as raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Value,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a content type header.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("Content-Type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// Status-only response with an empty body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Add or replace a header in place.
    pub fn set_header(&mut self, name: &str, value: String) {
        replace_header(&mut self.headers, name, value);
    }

    /// Merge the comma-separated tokens of `value` into `Vary`.
    ///
    /// Tokens already listed (case-insensitively) are not repeated, so layers
    /// can each add what they vary on without clobbering one another.
    pub fn append_vary(&mut self, value: &str) {
        let mut tokens: Vec<String> = self
            .get_header("Vary")
            .map(|current| vary_tokens(current).map(str::to_string).collect())
            .unwrap_or_default();
        for token in vary_tokens(value) {
            if !tokens.iter().any(|t| t.eq_ignore_ascii_case(token)) {
                tokens.push(token.to_string());
            }
        }
        if !tokens.is_empty() {
            self.set_header("Vary", tokens.join(", "));
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Whether the status is in the 2xx class.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Serialized body as sent on the wire.
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            Value::Null => Vec::new(),
            Value::String(s) => s.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        }
    }
}

fn vary_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty())
}
