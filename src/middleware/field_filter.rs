use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PipelineError;
use crate::message::{Request, Response};
use crate::pipeline::{Middleware, Next};

/// Sparse fieldsets: `?fields=id,name,address.city`.
///
/// The requested list is stored on the request for handlers that want to
/// select less data, and successful object (or array-of-object) responses are
/// projected down to it. Naming a field the response does not have is a
/// client error listing the fields that are available at that level.
#[derive(Debug, Clone)]
pub struct FieldFilterMiddleware {
    param: String,
}

impl FieldFilterMiddleware {
    #[must_use]
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

impl Default for FieldFilterMiddleware {
    fn default() -> Self {
        Self::new("fields")
    }
}

/// Parse a comma-separated field list, dropping blanks.
#[must_use]
pub fn parse_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
struct FieldTree {
    whole: bool,
    children: BTreeMap<String, FieldTree>,
}

impl FieldTree {
    fn from_paths(paths: &[String]) -> Self {
        let mut root = FieldTree::default();
        for path in paths {
            let mut node = &mut root;
            for part in path.split('.') {
                node = node.children.entry(part.to_string()).or_default();
            }
            node.whole = true;
        }
        root
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn project(value: &Value, tree: &FieldTree, prefix: &str) -> Result<Value, PipelineError> {
    if tree.whole {
        return Ok(value.clone());
    }
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| project(item, tree, prefix))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, sub) in &tree.children {
                let path = join(prefix, key);
                let Some(field) = map.get(key) else {
                    return Err(PipelineError::InvalidField {
                        field: path,
                        available: map.keys().map(|k| join(prefix, k)).collect(),
                    });
                };
                out.insert(key.clone(), project(field, sub, &path)?);
            }
            Ok(Value::Object(out))
        }
        _ => {
            let field = tree
                .children
                .keys()
                .next()
                .map(|k| join(prefix, k))
                .unwrap_or_else(|| prefix.to_string());
            Err(PipelineError::InvalidField {
                field,
                available: Vec::new(),
            })
        }
    }
}

/// Project `body` down to `fields`.
///
/// # Errors
///
/// [`PipelineError::InvalidField`] for the first field the body lacks.
pub fn filter_fields(body: &Value, fields: &[String]) -> Result<Value, PipelineError> {
    project(body, &FieldTree::from_paths(fields), "")
}

impl Middleware for FieldFilterMiddleware {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response, PipelineError> {
        let fields = request
            .query_param(&self.param)
            .map(parse_fields)
            .unwrap_or_default();
        if fields.is_empty() {
            return next.run(request);
        }

        debug!(request_id = %request.request_id, fields = ?fields, "Field selection requested");
        let mut response = next.run(request.with_fields(fields.clone()))?;
        if response.is_success() && matches!(response.body, Value::Object(_) | Value::Array(_)) {
            response.body = filter_fields(&response.body, &fields)?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(raw: &str) -> Vec<String> {
        parse_fields(raw)
    }

    #[test]
    fn keeps_only_requested_fields() {
        let body = json!({ "id": 1, "name": "Ada", "email": "ada@example.com" });
        let out = filter_fields(&body, &fields("id, name")).unwrap();
        assert_eq!(out, json!({ "id": 1, "name": "Ada" }));
    }

    #[test]
    fn dotted_paths_select_nested_fields() {
        let body = json!({ "id": 1, "address": { "city": "Paris", "zip": "75001" } });
        let out = filter_fields(&body, &fields("address.city")).unwrap();
        assert_eq!(out, json!({ "address": { "city": "Paris" } }));
    }

    #[test]
    fn arrays_are_filtered_per_item() {
        let body = json!([{ "id": 1, "x": true }, { "id": 2, "x": false }]);
        let out = filter_fields(&body, &fields("id")).unwrap();
        assert_eq!(out, json!([{ "id": 1 }, { "id": 2 }]));
    }

    #[test]
    fn unknown_field_lists_available() {
        let body = json!({ "id": 1, "name": "Ada" });
        match filter_fields(&body, &fields("id,secret")) {
            Err(PipelineError::InvalidField { field, available }) => {
                assert_eq!(field, "secret");
                assert_eq!(available, vec!["id".to_string(), "name".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_unknown_field_is_qualified() {
        let body = json!({ "address": { "city": "Paris" } });
        match filter_fields(&body, &fields("address.planet")) {
            Err(PipelineError::InvalidField { field, available }) => {
                assert_eq!(field, "address.planet");
                assert_eq!(available, vec!["address.city".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blanks_are_ignored() {
        assert_eq!(parse_fields(" id, ,name,"), vec!["id", "name"]);
        assert!(parse_fields("").is_empty());
    }
}
