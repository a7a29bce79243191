//! Path-by-path decoding of unstructured custom-resource documents.
//!
//! `ScalingPolicy`/`ScalingPolicyStatus` objects are consumed as
//! dynamically-typed trees rather than generated typed structs — a missing
//! key is not an error ("present=false"), but a type mismatch on a key that
//! *is* present is treated as a fatal programming error, since it means the
//! custom resource's schema and this code have drifted.

use serde_json::Value;

fn walk<'a>(mut value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    for segment in path {
        value = value.as_object()?.get(*segment)?;
    }
    Some(value)
}

/// Reads a nested string field. `Ok(None)` means the path is absent.
pub fn nested_string(root: &Value, path: &[&str]) -> Result<Option<String>, String> {
    match walk(root, path) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!(
            "expected string at `{}`, found {}",
            path.join("."),
            kind_of(other)
        )),
    }
}

/// Reads a nested integer field. `Ok(None)` means the path is absent.
pub fn nested_i64(root: &Value, path: &[&str]) -> Result<Option<i64>, String> {
    match walk(root, path) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| format!("integer at `{}` out of range", path.join("."))),
        Some(other) => Err(format!(
            "expected integer at `{}`, found {}",
            path.join("."),
            kind_of(other)
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_path_is_none_not_error() {
        let doc = json!({ "spec": {} });
        assert_eq!(nested_string(&doc, &["spec", "deployment"]), Ok(None));
    }

    #[test]
    fn present_wrong_type_is_error() {
        let doc = json!({ "spec": { "min": "not a number" } });
        assert!(nested_i64(&doc, &["spec", "min"]).is_err());
    }

    #[test]
    fn present_right_type_decodes() {
        let doc = json!({ "spec": { "min": 2, "deployment": "web" } });
        assert_eq!(nested_i64(&doc, &["spec", "min"]), Ok(Some(2)));
        assert_eq!(
            nested_string(&doc, &["spec", "deployment"]),
            Ok(Some("web".to_string()))
        );
    }
}
