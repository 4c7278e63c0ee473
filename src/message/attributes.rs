use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::router::RouteMatch;

/// Per-request scratch data that middleware hand downstream.
///
/// Well-known entries have typed accessors; anything else goes into the
/// free-form JSON map.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    user_id: Option<String>,
    claims: Option<Value>,
    route_match: Option<Arc<RouteMatch>>,
    fields: Option<Vec<String>>,
    values: HashMap<String, Value>,
}

impl Attributes {
    /// Authenticated user id, set by the auth middleware.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Verified token claims, set by the auth middleware.
    #[must_use]
    pub fn claims(&self) -> Option<&Value> {
        self.claims.as_ref()
    }

    /// The route match resolved by the dispatcher.
    #[must_use]
    pub fn route_match(&self) -> Option<&Arc<RouteMatch>> {
        self.route_match.as_ref()
    }

    /// Field list requested through the field filter.
    #[must_use]
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub(crate) fn set_user(&mut self, user_id: String, claims: Option<Value>) {
        self.user_id = Some(user_id);
        self.claims = claims;
    }

    pub(crate) fn set_route_match(&mut self, route_match: Arc<RouteMatch>) {
        self.route_match = Some(route_match);
    }

    pub(crate) fn set_fields(&mut self, fields: Vec<String>) {
        self.fields = Some(fields);
    }

    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.values.insert(key, value);
    }
}
