use serde_json::Value;

/// A single store record.
///
/// Records are open JSON objects keyed by field name. Fields the schema does
/// not declare are carried through untouched; with `preserve_order` enabled
/// the map keeps insertion order, so a record written to the log reads back
/// with its keys in the same order.
pub type Record = serde_json::Map<String, Value>;

/// Render a primary-key value as the string used for key comparisons.
///
/// Strings compare by their contents and numbers by their shortest decimal
/// form, so `"7"`, `7`, and `7.0` all address the same record.
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Short name of a JSON value's kind, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
