//! Field-path lookup and leaf flattening over parsed JSON payloads.
//!
//! Reference payloads are read through [`lookup_field`] /
//! [`extract_match_values`], which resolve configured `key` or
//! `parent.child` paths. Source payloads are read through
//! [`flatten_values`], which walks every leaf regardless of shape.

use serde_json::{Map, Value};

/// Maximum number of `.`-separated segments in a match field.
pub const MAX_FIELD_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field {0} not found")]
    NotFound(String),

    #[error("field {0} missing nested object")]
    InvalidNesting(String),

    #[error("field {0} depth unsupported")]
    UnsupportedDepth(String),
}

/// Canonical string form of a JSON value.
///
/// Strings are returned verbatim; numbers, booleans and null use their
/// JSON spelling; containers are rendered as compact JSON text.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Checks that `path` is `key` or `parent.child` with non-empty segments.
pub fn validate_field_path(path: &str) -> Result<(), String> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() > MAX_FIELD_DEPTH {
        return Err(format!(
            "match field '{path}' must be 'field' or 'parent.child'"
        ));
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(format!("match field '{path}' is invalid"));
    }
    Ok(())
}

/// Returns the value at a one- or two-segment path.
pub fn lookup_field<'a>(payload: &'a Map<String, Value>, path: &str) -> Result<&'a Value, FieldError> {
    let parts: Vec<&str> = path.split('.').collect();
    match parts.as_slice() {
        [key] => payload
            .get(*key)
            .ok_or_else(|| FieldError::NotFound(path.to_string())),
        [parent, child] => {
            let Some(Value::Object(nested)) = payload.get(*parent) else {
                return Err(FieldError::InvalidNesting(path.to_string()));
            };
            nested
                .get(*child)
                .ok_or_else(|| FieldError::NotFound(path.to_string()))
        }
        _ => Err(FieldError::UnsupportedDepth(path.to_string())),
    }
}

/// Resolves every field in caller order, failing on the first bad one.
pub fn extract_match_values<S: AsRef<str>>(
    payload: &Map<String, Value>,
    fields: &[S],
) -> Result<Vec<String>, FieldError> {
    fields
        .iter()
        .map(|field| lookup_field(payload, field.as_ref()).map(stringify))
        .collect()
}

/// Lazily yields every leaf of `value` as a string.
///
/// Object keys are visited in sorted order and array elements in their
/// original order, so the sequence is the same on every run. The
/// iterator is `Clone`, so a partially consumed walk can be restarted
/// from a saved copy.
#[must_use]
pub fn flatten_values(value: &Value) -> Leaves<'_> {
    Leaves { stack: vec![value] }
}

#[derive(Debug, Clone)]
pub struct Leaves<'a> {
    stack: Vec<&'a Value>,
}

impl Iterator for Leaves<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(value) = self.stack.pop() {
            match value {
                Value::Object(map) => {
                    let mut keys: Vec<&String> = map.keys().collect();
                    keys.sort_unstable();
                    // Stack is LIFO: push in reverse so the smallest key pops first.
                    self.stack
                        .extend(keys.into_iter().rev().filter_map(|k| map.get(k)));
                }
                Value::Array(items) => self.stack.extend(items.iter().rev()),
                leaf => return Some(stringify(leaf)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn lookup_top_level_and_nested() {
        let payload = object(json!({"fieldA": "value1", "sub": {"fieldB": 42}}));
        assert_eq!(lookup_field(&payload, "fieldA").unwrap(), &json!("value1"));
        assert_eq!(lookup_field(&payload, "sub.fieldB").unwrap(), &json!(42));
    }

    #[test]
    fn lookup_missing_key() {
        let payload = object(json!({"fieldA": "value1", "sub": {}}));
        assert_eq!(
            lookup_field(&payload, "missing"),
            Err(FieldError::NotFound("missing".into()))
        );
        assert_eq!(
            lookup_field(&payload, "sub.missing"),
            Err(FieldError::NotFound("sub.missing".into()))
        );
    }

    #[test]
    fn lookup_parent_not_an_object() {
        let payload = object(json!({"fieldA": "value1"}));
        assert_eq!(
            lookup_field(&payload, "fieldA.child"),
            Err(FieldError::InvalidNesting("fieldA.child".into()))
        );
        assert_eq!(
            lookup_field(&payload, "absent.child"),
            Err(FieldError::InvalidNesting("absent.child".into()))
        );
    }

    #[test]
    fn lookup_rejects_deep_paths() {
        let payload = object(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(
            lookup_field(&payload, "a.b.c"),
            Err(FieldError::UnsupportedDepth("a.b.c".into()))
        );
    }

    #[test]
    fn extract_preserves_caller_order() {
        let payload = object(json!({"fieldA": "value1", "sub": {"fieldB": "value2"}}));
        let values = extract_match_values(&payload, &["sub.fieldB", "fieldA"]).unwrap();
        assert_eq!(values, vec!["value2", "value1"]);
    }

    #[test]
    fn extract_fails_on_missing_field() {
        let payload = object(json!({"fieldA": "value1"}));
        assert!(extract_match_values(&payload, &["fieldA", "missing"]).is_err());
    }

    #[test]
    fn scalars_stringify_naturally() {
        assert_eq!(stringify(&json!("x")), "x");
        assert_eq!(stringify(&json!(12_345_678_901_i64)), "12345678901");
        assert_eq!(stringify(&json!(1.5)), "1.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&Value::Null), "null");
    }

    #[test]
    fn flatten_sorts_keys_and_keeps_array_order() {
        let value = json!({
            "b": ["x", {"z": 1, "y": 2}],
            "a": "first",
            "c": null
        });
        let leaves: Vec<String> = flatten_values(&value).collect();
        assert_eq!(leaves, vec!["first", "x", "2", "1", "null"]);
    }

    #[test]
    fn flatten_scalar_root_and_empty_containers() {
        assert_eq!(flatten_values(&json!("solo")).collect::<Vec<_>>(), vec!["solo"]);
        assert_eq!(flatten_values(&json!({})).count(), 0);
        assert_eq!(flatten_values(&json!([[], {}])).count(), 0);
    }

    #[test]
    fn flatten_is_restartable() {
        let value = json!({"a": 1, "b": [2, 3]});
        let mut walk = flatten_values(&value);
        assert_eq!(walk.next().as_deref(), Some("1"));
        let saved = walk.clone();
        assert_eq!(walk.collect::<Vec<_>>(), vec!["2", "3"]);
        assert_eq!(saved.collect::<Vec<_>>(), vec!["2", "3"]);
        assert_eq!(flatten_values(&value).count(), 3);
    }

    #[test]
    fn field_path_validation() {
        assert!(validate_field_path("a").is_ok());
        assert!(validate_field_path("a.b").is_ok());
        assert!(validate_field_path("a.b.c").is_err());
        assert!(validate_field_path("").is_err());
        assert!(validate_field_path("a.").is_err());
    }
}
