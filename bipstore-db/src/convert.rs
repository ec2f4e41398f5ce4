//! Conversions between record values and SQLite values.

use bipstore_model::FieldType;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Convert a record value for storage in a column of `field_type`.
///
/// Booleans become 0/1. Json columns hold strings as-is and every other
/// value as its serialized JSON text. Whole floats in integer columns are
/// stored as integers.
pub fn to_sql(value: Option<&Value>, field_type: FieldType) -> SqlValue {
    let Some(value) = value else {
        return SqlValue::Null;
    };

    match (value, field_type) {
        (Value::Null, _) => SqlValue::Null,
        (Value::String(s), _) => SqlValue::Text(s.clone()),
        (_, FieldType::Json) => SqlValue::Text(value.to_string()),
        (Value::Bool(b), _) => SqlValue::Integer(i64::from(*b)),
        (Value::Number(n), _) => number_to_sql(n, field_type),
        (Value::Array(_) | Value::Object(_), _) => SqlValue::Text(value.to_string()),
    }
}

fn number_to_sql(n: &Number, field_type: FieldType) -> SqlValue {
    if let Some(i) = n.as_i64() {
        return SqlValue::Integer(i);
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    if field_type == FieldType::Integer && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        SqlValue::Integer(f as i64)
    } else {
        SqlValue::Real(f)
    }
}

/// Convert a value read from SQLite back into a record value.
///
/// Blobs come back as arrays of byte values; non-finite reals as null.
pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
