//! Error types for schema loading and record validation.

use thiserror::Error;

use crate::FieldType;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A schema file that cannot be loaded, or a schema that breaks an invariant.
///
/// [`crate::Schema::validate`] reports the first violation it finds.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("reading schema file: {0}")]
    Read(#[from] std::io::Error),

    /// The schema file is not valid schema JSON.
    #[error("parsing schema JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("schema name is required")]
    MissingName,

    #[error("schema name {0:?} is not a valid identifier")]
    InvalidName(String),

    #[error("schema must have at least one field")]
    NoFields,

    #[error("field name {0:?} is not a valid identifier")]
    InvalidFieldName(String),

    /// `fts` set on a field that is not a string.
    #[error("field {field:?} has fts:true but type {field_type} (fts only valid for string)")]
    FtsOnNonString { field: String, field_type: FieldType },

    /// `enum` set on a field that is not a string.
    #[error("field {field:?} has enum but type {field_type} (enum only valid for string)")]
    EnumOnNonString { field: String, field_type: FieldType },

    #[error("field {0:?} has empty enum value")]
    EmptyEnumValue(String),

    #[error("schema must have exactly one primary key field")]
    NoPrimaryKey,

    #[error("schema has multiple primary keys: {}", .0.join(", "))]
    MultiplePrimaryKeys(Vec<String>),
}

/// A record that does not conform to its store's schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing primary key field {0:?}")]
    MissingPrimaryKey(String),

    #[error("primary key field {0:?} is null")]
    NullPrimaryKey(String),

    /// The value's JSON kind is incompatible with the declared type.
    #[error("field {field:?}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },

    /// An integer field holding a number with a fractional part.
    #[error("field {field:?}: expected integer, got float {value}")]
    NotAnInteger { field: String, value: f64 },

    /// A string outside the field's allowed values.
    #[error("field {field:?}: value {value:?} not in enum [{}]", .allowed.join(", "))]
    NotInEnum {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
}
