//! A single named store: validated appends to its JSONL log, deletes by
//! atomic rewrite, and hash-checked rebuilds of its SQLite mirror.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use bipstore_db::Mirror;
use bipstore_model::{Record, Schema, is_valid_identifier, key_string};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::log;
use crate::registry::{self, DEFAULT_STORE_DIR, StoreConfig};

/// A named store: a schema plus its `<name>.jsonl` log and `<name>.db`
/// mirror inside one directory.
///
/// The store owns both files while open. All operations are synchronous and
/// each opens the mirror for its own duration.
#[derive(Debug, Clone)]
pub struct Store {
    name: String,
    schema: Schema,
    dir: PathBuf,
    schema_path: PathBuf,
    jsonl_path: PathBuf,
    db_path: PathBuf,
}

/// Operator-facing summary of a store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub jsonl_path: PathBuf,
    pub db_path: PathBuf,
    pub schema_path: PathBuf,
    pub records: usize,
    pub jsonl_size: u64,
    pub db_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    pub in_sync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl StoreInfo {
    /// Partial info for a store that could not be opened or inspected.
    pub(crate) fn failed(name: &str, schema_path: &str, error: &StoreError) -> Self {
        Self {
            name: name.to_string(),
            schema_path: PathBuf::from(schema_path),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Result of [`Store::sync_if_needed`]; both carry the record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Rebuilt(usize),
    Skipped(usize),
}

impl Store {
    /// Binds a store to `dir`. Does not touch the filesystem.
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        dir: impl Into<PathBuf>,
        schema_path: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        let dir = dir.into();
        Self {
            jsonl_path: dir.join(format!("{name}.jsonl")),
            db_path: dir.join(format!("{name}.db")),
            name,
            schema,
            dir,
            schema_path: schema_path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Creates the store's directory, log and mirror, then registers it
    /// under `root`.
    ///
    /// An existing log is kept. The registry records the schema path and
    /// directory relative to `root`; the directory is omitted when it is
    /// the default.
    pub fn init(&self, root: &Path) -> StoreResult<()> {
        if !is_valid_identifier(&self.name) {
            return Err(StoreError::InvalidStoreName(self.name.clone()));
        }
        self.schema.validate()?;

        fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.jsonl_path)?;
        self.open_mirror()?;

        let mut reg = registry::load_registry(root)?;
        let dir = if self.dir == root.join(DEFAULT_STORE_DIR) {
            None
        } else {
            Some(relative_to(root, &self.dir))
        };
        reg.stores.insert(
            self.name.clone(),
            StoreConfig {
                schema: relative_to(root, &self.schema_path),
                dir,
            },
        );
        registry::save_registry(root, &reg)?;

        info!(store = %self.name, dir = %self.dir.display(), "store initialized");
        Ok(())
    }

    fn open_mirror(&self) -> StoreResult<Mirror> {
        Ok(Mirror::open(&self.db_path, &self.schema)?)
    }

    // ── Log ──────────────────────────────────────────────────────

    /// Number of records in the log.
    pub fn count(&self) -> StoreResult<usize> {
        Ok(log::read_all_records(&self.jsonl_path)?.len())
    }

    /// Validates `record` and appends it to the log.
    ///
    /// Rejects records that fail validation or whose primary key is already
    /// in the log; a rejected append leaves the log unchanged.
    pub fn append(&self, record: &Record) -> StoreResult<()> {
        self.schema.validate_record(record)?;

        let pk = self.schema.primary_key_field();
        let key = key_string(record.get(pk).unwrap_or(&Value::Null));
        if log::contains_key(&self.jsonl_path, pk, &key)? {
            return Err(StoreError::DuplicateKey(key));
        }

        log::append_record(&self.jsonl_path, record)?;
        debug!(store = %self.name, key = %key, "record appended");
        Ok(())
    }

    /// Removes the record whose primary key stringifies to `id`.
    pub fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let pk = self.schema.primary_key_field();
        let mut records = log::read_all_records(&self.jsonl_path)?;
        let before = records.len();
        records.retain(|r| key_string(r.get(pk).unwrap_or(&Value::Null)) != id);

        if records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        log::write_all_records(&self.jsonl_path, &records)?;
        debug!(store = %self.name, key = %id, "record deleted");
        Ok(())
    }

    /// Removes every record the mirror matches with the SQL `predicate`.
    ///
    /// Matching runs against the mirror, so records appended since the last
    /// sync are invisible to it. Returns how many records left the log; no
    /// match is not an error.
    pub fn delete_where(&self, predicate: &str) -> StoreResult<usize> {
        let keys: HashSet<String> = self
            .open_mirror()?
            .select_keys(&self.schema, predicate)?
            .into_iter()
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }

        let pk = self.schema.primary_key_field();
        let mut records = log::read_all_records(&self.jsonl_path)?;
        let before = records.len();
        records.retain(|r| !keys.contains(&key_string(r.get(pk).unwrap_or(&Value::Null))));
        let removed = before - records.len();

        log::write_all_records(&self.jsonl_path, &records)?;
        debug!(store = %self.name, removed, "records deleted by predicate");
        Ok(removed)
    }

    // ── Sync ─────────────────────────────────────────────────────

    /// True when the mirror's checkpoint differs from the log's hash.
    ///
    /// Any error while hashing or reading the checkpoint counts as stale.
    pub fn needs_sync(&self) -> bool {
        let current = match log::compute_hash(&self.jsonl_path) {
            Ok(h) => h,
            Err(e) => {
                warn!(store = %self.name, error = %e, "hashing log failed, treating as stale");
                return true;
            }
        };
        let stored = self
            .open_mirror()
            .and_then(|m| Ok(m.stored_hash()?));
        match stored {
            Ok(Some(stored)) => stored != current,
            Ok(None) => true,
            Err(e) => {
                warn!(store = %self.name, error = %e, "reading checkpoint failed, treating as stale");
                true
            }
        }
    }

    /// Rebuilds the mirror from the full log and returns the record count.
    ///
    /// The clear, reinsert and checkpoint update run in one transaction. A
    /// missing store directory is recreated.
    pub fn sync(&self) -> StoreResult<usize> {
        let records = log::read_all_records(&self.jsonl_path)?;
        let hash = log::compute_hash(&self.jsonl_path)?;

        fs::create_dir_all(&self.dir)?;
        let mut mirror = self.open_mirror()?;
        let n = mirror.rebuild(&self.schema, &records, &hash, Utc::now())?;

        info!(store = %self.name, records = n, hash = %hash, "store synced");
        Ok(n)
    }

    /// Syncs only if [`Store::needs_sync`] says the mirror is stale.
    pub fn sync_if_needed(&self) -> StoreResult<SyncOutcome> {
        if self.needs_sync() {
            Ok(SyncOutcome::Rebuilt(self.sync()?))
        } else {
            Ok(SyncOutcome::Skipped(self.count()?))
        }
    }

    /// Time of the last successful sync, if any.
    pub fn last_sync(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.open_mirror()?.last_sync()?)
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Runs SQL against the mirror. Sync first to see recent appends.
    pub fn query(&self, sql: &str) -> StoreResult<Vec<Record>> {
        Ok(self.open_mirror()?.query(sql)?)
    }

    /// Full-text search over the schema's `fts` fields.
    pub fn search(&self, text: &str) -> StoreResult<Vec<Record>> {
        Ok(self.open_mirror()?.search(&self.schema, text)?)
    }

    /// Record count, file sizes, sync state and schema.
    pub fn info(&self) -> StoreResult<StoreInfo> {
        let records = self.count()?;
        let size = |p: &Path| fs::metadata(p).map(|m| m.len()).unwrap_or(0);

        Ok(StoreInfo {
            name: self.name.clone(),
            jsonl_path: self.jsonl_path.clone(),
            db_path: self.db_path.clone(),
            schema_path: self.schema_path.clone(),
            records,
            jsonl_size: size(&self.jsonl_path),
            db_size: size(&self.db_path),
            last_sync: self.last_sync().ok().flatten(),
            in_sync: !self.needs_sync(),
            error: None,
            schema: Some(self.schema.clone()),
        })
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
