//! JSON utility functions

use serde_json::Value as JsonValue;

/// Parse a string attribute as a JSON document when it looks like one.
///
/// Only values whose trimmed form ends with `}` or `]` are considered, and
/// only objects and arrays are accepted.
pub fn parse_json_document(value: &str) -> Option<JsonValue> {
    let trimmed = value.trim();
    if !(trimmed.ends_with('}') || trimmed.ends_with(']')) {
        return None;
    }
    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(doc @ (JsonValue::Object(_) | JsonValue::Array(_))) => Some(doc),
        _ => None,
    }
}

/// Flatten a JSON document into `(path, value)` leaves.
///
/// Object members are joined with `.`, array elements use their index and
/// an empty array yields a single `[]` leaf. Nulls render as empty strings.
pub fn flatten_json(doc: &JsonValue) -> Vec<(String, String)> {
    let mut out = Vec::new();
    recurse(doc, String::new(), &mut out);
    out
}

fn recurse(value: &JsonValue, path: String, out: &mut Vec<(String, String)>) {
    match value {
        JsonValue::Object(map) => {
            for (name, member) in map {
                let child = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                };
                recurse(member, child, out);
            }
        }
        JsonValue::Array(items) => {
            if items.is_empty() {
                out.push((path, "[]".to_string()));
                return;
            }
            for (i, item) in items.iter().enumerate() {
                let child = if path.is_empty() {
                    i.to_string()
                } else {
                    format!("{}.{}", path, i)
                };
                recurse(item, child, out);
            }
        }
        JsonValue::String(s) => out.push((path, s.clone())),
        JsonValue::Number(n) => out.push((path, n.to_string())),
        JsonValue::Bool(b) => out.push((path, b.to_string())),
        JsonValue::Null => out.push((path, String::new())),
    }
}

/// Add virtual `key.path` attributes for every JSON-valued attribute.
///
/// Existing keys are never overwritten.
pub fn expand_virtual_attributes(attrs: &mut Vec<(String, String)>) {
    let mut extra = Vec::new();
    for (key, value) in attrs.iter() {
        if let Some(doc) = parse_json_document(value) {
            for (path, leaf) in flatten_json(&doc) {
                extra.push((format!("{}.{}", key, path), leaf));
            }
        }
    }
    for (key, value) in extra {
        if !attrs.iter().any(|(k, _)| *k == key) {
            attrs.push((key, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_document_requires_container() {
        assert!(parse_json_document(r#"{"a":1}"#).is_some());
        assert!(parse_json_document("  [1,2]  ").is_some());
        assert!(parse_json_document("42").is_none());
        assert!(parse_json_document("plain text}").is_none());
        assert!(parse_json_document(r#""quoted""#).is_none());
    }

    #[test]
    fn test_flatten_nested_object() {
        let leaves = flatten_json(&json!({"user": {"id": 7, "name": "ann"}, "ok": true}));
        assert_eq!(
            leaves,
            vec![
                ("user.id".to_string(), "7".to_string()),
                ("user.name".to_string(), "ann".to_string()),
                ("ok".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_flatten_arrays_by_index() {
        let leaves = flatten_json(&json!({"items": [{"sku": "a"}, {"sku": "b"}], "tags": []}));
        assert_eq!(
            leaves,
            vec![
                ("items.0.sku".to_string(), "a".to_string()),
                ("items.1.sku".to_string(), "b".to_string()),
                ("tags".to_string(), "[]".to_string()),
            ]
        );
    }

    #[test]
    fn test_flatten_root_array() {
        let leaves = flatten_json(&json!(["x", null]));
        assert_eq!(
            leaves,
            vec![
                ("0".to_string(), "x".to_string()),
                ("1".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_expand_virtual_attributes() {
        let mut attrs = vec![
            ("payload".to_string(), r#"{"order":{"id":"o-1"}}"#.to_string()),
            ("plain".to_string(), "value".to_string()),
        ];
        expand_virtual_attributes(&mut attrs);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[2], ("payload.order.id".to_string(), "o-1".to_string()));
    }
}
