//! Error types for the storage layer.

use bipstore_db::MirrorError;
use bipstore_model::{SchemaError, ValidationError};
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A log line is not a JSON object. `line` is 1-based.
    #[error("parsing line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A log line exceeds the reader's per-line limit.
    #[error("line {line} exceeds {limit} bytes")]
    LineTooLong { line: usize, limit: usize },

    /// A record could not be encoded.
    #[error("encoding record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record rejected by the schema.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Append rejected because the primary key is already in the log.
    #[error("duplicate primary key: {0:?} already exists")]
    DuplicateKey(String),

    /// No record with this primary key.
    #[error("record {0:?} not found")]
    NotFound(String),

    /// Schema file unreadable or schema invalid.
    #[error("loading schema: {0}")]
    Schema(#[from] SchemaError),

    /// SQL mirror error.
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// Name not present in the registry.
    #[error("store {0:?} not found")]
    StoreNotFound(String),

    /// Store name that cannot be used as a file stem and SQL alias.
    #[error("store name {0:?} is not a valid identifier")]
    InvalidStoreName(String),

    /// Registry file is not valid registry JSON.
    #[error("parsing registry: {0}")]
    Registry(#[source] serde_json::Error),
}
