//! SQLite mirror for bipartite stores.
//!
//! The JSONL log is the source of truth; this crate maintains the derived,
//! queryable copy of it. A mirror file holds:
//!
//! - one table named after the schema, primary key from the schema
//! - one non-unique index per `index` field
//! - an FTS5 table `<schema>_fts` when any field is flagged `fts`
//! - a `_meta(key, value)` table holding the sync checkpoint
//!
//! Each [`Mirror`] owns exactly one connection; SQLite has a single writer,
//! so all mirror access through it is serialized.

mod convert;
mod ddl;
mod error;
mod mirror;

pub use convert::{from_sql, to_sql};
pub use ddl::{META_TABLE_SQL, column_type, create_fts_sql, create_index_sql, create_table_sql};
pub use error::{MirrorError, MirrorResult};
pub use mirror::{Mirror, prepare_fts_query};

/// `_meta` key for the hash of the log the mirror was built from.
pub const META_JSONL_HASH: &str = "jsonl_hash";

/// `_meta` key for the RFC 3339 time of the last successful sync.
pub const META_LAST_SYNC: &str = "last_sync";
