//! Schema and record model for bipartite stores.
//!
//! Defines the types every store layer depends on:
//! - [`Schema`]: declares a store's fields, their types, and constraints
//! - [`Field`] / [`FieldType`]: a single declared column
//! - [`Record`]: one schema-flexible row, as an ordered JSON object
//!
//! Schemas are loaded once per store-open and are immutable afterwards.
//! Nothing in this crate performs I/O except [`Schema::from_file`].

mod error;
mod record;
mod schema;

pub use error::{SchemaError, SchemaResult, ValidationError};
pub use record::{Record, key_string, value_kind};
pub use schema::{Field, FieldType, Schema, is_valid_identifier};
