use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult, ValidationError};
use crate::record::{Record, value_kind};

/// Identifiers usable as SQLite table, column, and schema names.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("identifier pattern is valid")
});

/// Returns true if `name` can be used unquoted as a SQL identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Describes one store's structure: its table name and declared fields.
///
/// Fields live in a sorted map, so anything generated from a schema (DDL,
/// insert column lists) comes out in the same order every time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

/// A declared field and its constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub index: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fts: bool,
    /// Allowed values. Empty means unconstrained.
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Field {
    /// Shorthand for a field with no flags set.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }

    /// Shorthand for the primary-key field.
    pub fn primary(field_type: FieldType) -> Self {
        Self {
            primary: true,
            ..Self::new(field_type)
        }
    }

    /// Marks this field for a secondary index.
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// Marks this field for full-text search.
    pub fn searchable(mut self) -> Self {
        self.fts = true;
        self
    }

    /// Restricts this field to a fixed set of values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// The data type of a field.
///
/// Dates and datetimes are ISO 8601 strings; `json` holds any JSON value and
/// is mirrored as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Json,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Schema {
    /// Starts an empty schema; add fields with [`Schema::field`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Parses a schema from JSON text. Does not validate it.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a schema file. Does not validate it.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Checks the schema-level invariants, stopping at the first violation.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.name.is_empty() {
            return Err(SchemaError::MissingName);
        }
        if !is_valid_identifier(&self.name) {
            return Err(SchemaError::InvalidName(self.name.clone()));
        }
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields);
        }

        let mut primary = Vec::new();
        for (name, field) in &self.fields {
            if !is_valid_identifier(name) {
                return Err(SchemaError::InvalidFieldName(name.clone()));
            }
            if field.primary {
                primary.push(name.clone());
            }
            if field.fts && field.field_type != FieldType::String {
                return Err(SchemaError::FtsOnNonString {
                    field: name.clone(),
                    field_type: field.field_type,
                });
            }
            if !field.enum_values.is_empty() {
                if field.field_type != FieldType::String {
                    return Err(SchemaError::EnumOnNonString {
                        field: name.clone(),
                        field_type: field.field_type,
                    });
                }
                if field.enum_values.iter().any(String::is_empty) {
                    return Err(SchemaError::EmptyEnumValue(name.clone()));
                }
            }
        }

        match primary.len() {
            0 => Err(SchemaError::NoPrimaryKey),
            1 => Ok(()),
            _ => Err(SchemaError::MultiplePrimaryKeys(primary)),
        }
    }

    /// Name of the primary-key field, if one is declared.
    pub fn primary_key(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, f)| f.primary)
            .map(|(name, _)| name.as_str())
    }

    /// Name of the primary-key field.
    ///
    /// # Panics
    ///
    /// Panics if the schema declares no primary key. Schemas are validated
    /// before use, so this indicates a programming error.
    pub fn primary_key_field(&self) -> &str {
        match self.primary_key() {
            Some(name) => name,
            None => panic!("schema {:?} has no primary key field", self.name),
        }
    }

    /// Fields flagged `fts`, in column order.
    pub fn fts_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.fts)
            .map(|(name, _)| name.as_str())
    }

    /// True if the mirror gets a full-text table for this schema.
    pub fn has_fts(&self) -> bool {
        self.fields.values().any(|f| f.fts)
    }

    /// Fields that get a secondary index (the primary key never does).
    pub fn indexed_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.index && !f.primary)
            .map(|(name, _)| name.as_str())
    }

    /// Name of the mirror's full-text table.
    pub fn fts_table(&self) -> String {
        format!("{}_fts", self.name)
    }

    /// Checks a record against the declared fields.
    ///
    /// The primary key must be present and non-null. Every other declared
    /// field that is present and non-null must match its type; undeclared
    /// fields pass through. Returns the first violation found.
    pub fn validate_record(&self, record: &Record) -> Result<(), ValidationError> {
        let pk = self.primary_key_field();
        match record.get(pk) {
            None => return Err(ValidationError::MissingPrimaryKey(pk.to_string())),
            Some(Value::Null) => return Err(ValidationError::NullPrimaryKey(pk.to_string())),
            Some(_) => {}
        }

        for (name, value) in record {
            let Some(field) = self.fields.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            check_value(name, field, value)?;
        }
        Ok(())
    }
}

fn check_value(name: &str, field: &Field, value: &Value) -> Result<(), ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        field: name.to_string(),
        expected: field.field_type,
        actual: value_kind(value),
    };

    match field.field_type {
        FieldType::String => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if !field.enum_values.is_empty() && !field.enum_values.iter().any(|e| e == s) {
                return Err(ValidationError::NotInEnum {
                    field: name.to_string(),
                    value: s.to_string(),
                    allowed: field.enum_values.clone(),
                });
            }
        }
        FieldType::Integer => {
            let Value::Number(n) = value else {
                return Err(mismatch());
            };
            if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                if f.fract() != 0.0 || !f.is_finite() {
                    return Err(ValidationError::NotAnInteger {
                        field: name.to_string(),
                        value: f,
                    });
                }
            }
        }
        FieldType::Float => {
            if !value.is_number() {
                return Err(mismatch());
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                return Err(mismatch());
            }
        }
        // Format is not enforced; any string is accepted.
        FieldType::Date | FieldType::Datetime => {
            if !value.is_string() {
                return Err(mismatch());
            }
        }
        FieldType::Json => {}
    }
    Ok(())
}
