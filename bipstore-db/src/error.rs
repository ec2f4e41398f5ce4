//! Error types for the mirror layer.

use thiserror::Error;

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors that can occur in mirror operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A SQL statement failed; `context` says which step issued it.
    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Full-text search on a schema with no `fts` fields.
    #[error("schema {0:?} has no full-text fields")]
    NoFullTextIndex(String),

    /// Name that cannot be used as an ATTACH alias.
    #[error("invalid database alias: {0:?}")]
    InvalidAlias(String),

    /// Stored `last_sync` value is not RFC 3339.
    #[error("invalid last_sync timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl MirrorError {
    pub(crate) fn query(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let context = context.into();
        move |source| Self::Query { context, source }
    }
}
