use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use http::Method;
use serde_json::Value;

use super::{find_header, replace_header, Attributes, HeaderVec};
use crate::ids::RequestId;
use crate::router::RouteMatch;

/// An inbound request as seen by the router and the middleware chain.
#[derive(Debug, Clone)]
pub struct Request {
    /// Correlation id for logs
    pub request_id: RequestId,
    pub method: Method,
    /// Path without the query string
    pub path: String,
    pub headers: HeaderVec,
    /// Decoded query string parameters (last occurrence wins)
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
    /// Peer address, used to key anonymous callers for rate limiting
    pub remote_addr: Option<IpAddr>,
    pub attributes: Attributes,
}

impl Request {
    /// Build a request from a method and a request target (`/path?query`).
    ///
    /// ```
    /// use http::Method;
    /// use waypoint::message::Request;
    ///
    /// let req = Request::new(Method::GET, "/api/clients?page=2&sort=name");
    /// assert_eq!(req.path, "/api/clients");
    /// assert_eq!(req.query_param("page"), Some("2"));
    /// ```
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, HashMap::new()),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            headers: HeaderVec::new(),
            query,
            body: None,
            remote_addr: None,
            attributes: Attributes::default(),
        }
    }

    #[must_use]
    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    /// Case-insensitive header lookup.
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Add or replace a header. An `X-Request-Id` carrying a ULID also
    /// becomes the request id.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case("x-request-id") {
            self.request_id = RequestId::from_header_or_new(Some(&value));
        }
        replace_header(&mut self.headers, name, value);
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Mark the request as authenticated.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>, claims: Option<Value>) -> Self {
        self.attributes.set_user(user_id.into(), claims);
        self
    }

    #[must_use]
    pub fn with_route_match(mut self, route_match: Arc<RouteMatch>) -> Self {
        self.attributes.set_route_match(route_match);
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.attributes.set_fields(fields);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Path parameter from the resolved route match, if any.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.attributes
            .route_match()
            .and_then(|m| m.get_path_param(name))
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}
