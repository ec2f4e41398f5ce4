use bipstore_model::{Field, FieldType, Record, Schema, ValidationError, key_string};
use serde_json::{Value, json};

fn schema() -> Schema {
    Schema::new("test_store")
        .field("id", Field::primary(FieldType::String))
        .field("name", Field::new(FieldType::String).searchable())
        .field("count", Field::new(FieldType::Integer).indexed())
        .field("score", Field::new(FieldType::Float))
        .field("active", Field::new(FieldType::Boolean))
        .field("day", Field::new(FieldType::Date))
        .field("meta", Field::new(FieldType::Json))
        .field(
            "status",
            Field::new(FieldType::String).one_of(["pending", "active", "done"]),
        )
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

// ── Primary key ──────────────────────────────────────────────────

#[test]
fn valid_record_passes() {
    let r = record(json!({
        "id": "1", "name": "first", "count": 10, "score": 0.5,
        "active": true, "day": "2025-01-01", "meta": {"a": [1, 2]}, "status": "pending"
    }));
    schema().validate_record(&r).unwrap();
}

#[test]
fn missing_primary_key() {
    let r = record(json!({"name": "x"}));
    assert_eq!(
        schema().validate_record(&r),
        Err(ValidationError::MissingPrimaryKey("id".into()))
    );
}

#[test]
fn null_primary_key() {
    let r = record(json!({"id": null}));
    assert_eq!(
        schema().validate_record(&r),
        Err(ValidationError::NullPrimaryKey("id".into()))
    );
}

// ── Type checks ──────────────────────────────────────────────────

#[test]
fn string_field_rejects_number() {
    let r = record(json!({"id": "1", "name": 42}));
    let err = schema().validate_record(&r).unwrap_err();
    assert_eq!(
        err,
        ValidationError::TypeMismatch {
            field: "name".into(),
            expected: FieldType::String,
            actual: "integer",
        }
    );
    assert_eq!(format!("{err}"), r#"field "name": expected string, got integer"#);
}

#[test]
fn integer_accepts_whole_float() {
    let r = record(json!({"id": "1", "count": 3.0}));
    schema().validate_record(&r).unwrap();
}

#[test]
fn integer_rejects_fraction() {
    let r = record(json!({"id": "1", "count": 3.14}));
    assert!(matches!(
        schema().validate_record(&r),
        Err(ValidationError::NotAnInteger { ref field, .. }) if field == "count"
    ));
}

#[test]
fn fractional_integer_error_carries_value() {
    let r = record(json!({"id": "1", "count": 2.5}));
    let err = schema().validate_record(&r).unwrap_err();
    assert_eq!(
        err,
        ValidationError::NotAnInteger {
            field: "count".into(),
            value: 2.5,
        }
    );
    assert_eq!(err.clone(), err);
}

#[test]
fn integer_rejects_string() {
    let r = record(json!({"id": "1", "count": "3"}));
    assert!(matches!(
        schema().validate_record(&r),
        Err(ValidationError::TypeMismatch { actual: "string", .. })
    ));
}

#[test]
fn float_accepts_integer_and_fraction() {
    schema()
        .validate_record(&record(json!({"id": "1", "score": 2})))
        .unwrap();
    schema()
        .validate_record(&record(json!({"id": "1", "score": 2.75})))
        .unwrap();
}

#[test]
fn boolean_rejects_integer() {
    let r = record(json!({"id": "1", "active": 1}));
    assert!(matches!(
        schema().validate_record(&r),
        Err(ValidationError::TypeMismatch { expected: FieldType::Boolean, .. })
    ));
}

#[test]
fn date_accepts_any_string() {
    let r = record(json!({"id": "1", "day": "not really a date"}));
    schema().validate_record(&r).unwrap();
}

#[test]
fn date_rejects_number() {
    let r = record(json!({"id": "1", "day": 20250101}));
    assert!(schema().validate_record(&r).is_err());
}

#[test]
fn json_accepts_anything() {
    for v in [json!(1), json!("s"), json!([1, "a"]), json!({"x": null}), json!(false)] {
        let mut r = record(json!({"id": "1"}));
        r.insert("meta".into(), v);
        schema().validate_record(&r).unwrap();
    }
}

// ── Enum, nulls, extras ──────────────────────────────────────────

#[test]
fn enum_member_accepted() {
    let r = record(json!({"id": "1", "status": "done"}));
    schema().validate_record(&r).unwrap();
}

#[test]
fn enum_is_case_sensitive() {
    let r = record(json!({"id": "1", "status": "Done"}));
    let err = schema().validate_record(&r).unwrap_err();
    assert!(matches!(err, ValidationError::NotInEnum { ref value, .. } if value == "Done"));
    assert!(format!("{err}").contains("pending, active, done"));
}

#[test]
fn null_non_primary_fields_allowed() {
    let r = record(json!({"id": "1", "count": null, "status": null, "active": null}));
    schema().validate_record(&r).unwrap();
}

#[test]
fn undeclared_fields_pass_through() {
    let r = record(json!({"id": "1", "extra": {"anything": [1, 2, 3]}, "other": 3.5}));
    schema().validate_record(&r).unwrap();
}

#[test]
fn validation_does_not_mutate() {
    let r = record(json!({"id": "1", "count": 3.0, "extra": true}));
    let before = r.clone();
    schema().validate_record(&r).unwrap();
    assert_eq!(r, before);
}

// ── Key strings ──────────────────────────────────────────────────

#[test]
fn key_string_forms() {
    assert_eq!(key_string(&json!("pr-123")), "pr-123");
    assert_eq!(key_string(&json!(7)), "7");
    assert_eq!(key_string(&json!(7.0)), "7");
    assert_eq!(key_string(&json!(2.5)), "2.5");
    assert_eq!(key_string(&json!(true)), "true");
}
