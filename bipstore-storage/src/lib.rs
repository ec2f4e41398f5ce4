//! JSONL-backed record stores for bipartite.
//!
//! A store keeps its records in an append-only JSON-lines log (the source of
//! truth) and mirrors them into SQLite for querying.
//!
//! # Architecture
//!
//! - [`log`] reads, appends, atomically rewrites and hashes `<name>.jsonl`
//! - [`Store`] validates and appends records, detects a stale mirror by
//!   comparing the log's SHA-256 with the checkpoint in `<name>.db`, and
//!   rebuilds the mirror on [`Store::sync`]
//! - [`registry`] maps store names to schema files and directories in
//!   `.bipartite/stores.json`, and federates every store into one
//!   connection for cross-store SQL
//!
//! Queries see the mirror as of the last sync. There is no inter-process
//! locking; a store assumes one cooperating writer process.

mod error;
pub mod log;
pub mod registry;
mod store;

pub use error::{StoreError, StoreResult};
pub use registry::{
    AttachedStores, DEFAULT_STORE_DIR, REGISTRY_FILENAME, StoreConfig, StoreRegistry,
    attach_all_stores, list_stores, load_registry, open_store, query_cross, save_registry,
};
pub use store::{Store, StoreInfo, SyncOutcome};

pub use bipstore_model::{Field, FieldType, Record, Schema};
