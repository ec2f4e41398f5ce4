//! The store registry and cross-store queries.
//!
//! `<root>/.bipartite/stores.json` maps each store name to its schema file
//! and, optionally, its directory:
//!
//! ```json
//! {"stores": {"prs": {"schema": "schemas/prs.json", "dir": "data/prs"}}}
//! ```
//!
//! Relative paths resolve against the repository root. A store without a
//! `dir` lives in `<root>/.bipartite`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bipstore_db::Mirror;
use bipstore_model::{Record, Schema, is_valid_identifier};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{Store, StoreInfo};

/// Directory under the repository root holding the registry and default
/// store files.
pub const DEFAULT_STORE_DIR: &str = ".bipartite";

/// Registry file name inside [`DEFAULT_STORE_DIR`].
pub const REGISTRY_FILENAME: &str = "stores.json";

/// All registered stores, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRegistry {
    #[serde(default)]
    pub stores: BTreeMap<String, StoreConfig>,
}

/// Where one store's schema and files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Schema file path.
    pub schema: String,
    /// Store directory; `None` or empty means the default directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

fn registry_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_STORE_DIR).join(REGISTRY_FILENAME)
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

/// Reads the registry. A missing file reads as an empty registry.
pub fn load_registry(root: &Path) -> StoreResult<StoreRegistry> {
    let data = match fs::read(registry_path(root)) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreRegistry::default()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&data).map_err(StoreError::Registry)
}

/// Writes the whole registry back, replacing the file atomically.
pub fn save_registry(root: &Path, registry: &StoreRegistry) -> StoreResult<()> {
    let dir = root.join(DEFAULT_STORE_DIR);
    fs::create_dir_all(&dir)?;

    let mut data = serde_json::to_vec_pretty(registry)?;
    data.push(b'\n');

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .suffix(".json")
        .tempfile_in(&dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(REGISTRY_FILENAME))
        .map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Opens a registered store: loads and validates its schema and binds it to
/// its directory.
pub fn open_store(root: &Path, name: &str) -> StoreResult<Store> {
    let registry = load_registry(root)?;
    let config = registry
        .stores
        .get(name)
        .ok_or_else(|| StoreError::StoreNotFound(name.to_string()))?;
    open_configured(root, name, config)
}

fn open_configured(root: &Path, name: &str, config: &StoreConfig) -> StoreResult<Store> {
    let schema_path = resolve(root, &config.schema);
    let schema = Schema::from_file(&schema_path)?;
    schema.validate()?;

    let dir = match config.dir.as_deref() {
        Some(dir) if !dir.is_empty() => resolve(root, dir),
        _ => root.join(DEFAULT_STORE_DIR),
    };
    Ok(Store::new(name, schema, dir, schema_path))
}

/// Info for every registered store, in name order.
///
/// A store that fails to open or inspect still gets an entry, with the
/// failure in [`StoreInfo::error`].
pub fn list_stores(root: &Path) -> StoreResult<Vec<StoreInfo>> {
    let registry = load_registry(root)?;
    let infos = registry
        .stores
        .iter()
        .map(|(name, config)| {
            open_configured(root, name, config)
                .and_then(|store| store.info())
                .unwrap_or_else(|e| {
                    warn!(store = %name, error = %e, "store unavailable");
                    StoreInfo::failed(name, &config.schema, &e)
                })
        })
        .collect();
    Ok(infos)
}

/// Aliases attached to a host mirror. Detaches them all when dropped.
pub struct AttachedStores<'a> {
    host: &'a Mirror,
    aliases: Vec<String>,
}

impl AttachedStores<'_> {
    /// Names of the stores that were attached.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Detaches every attached store now.
    pub fn detach_all(mut self) {
        self.detach_inner();
    }

    fn detach_inner(&mut self) {
        for alias in self.aliases.drain(..) {
            if let Err(e) = self.host.detach(&alias) {
                debug!(store = %alias, error = %e, "detach failed");
            }
        }
    }
}

impl Drop for AttachedStores<'_> {
    fn drop(&mut self) {
        self.detach_inner();
    }
}

/// Attaches every registered store's mirror to `host` under the store's
/// name, so SQL can address `<name>.<table>`.
///
/// Best effort: stores that fail to open or attach are skipped.
pub fn attach_all_stores<'a>(host: &'a Mirror, root: &Path) -> StoreResult<AttachedStores<'a>> {
    let registry = load_registry(root)?;
    let mut attached = AttachedStores {
        host,
        aliases: Vec::new(),
    };

    for (name, config) in &registry.stores {
        if !is_valid_identifier(name) {
            debug!(store = %name, "skipping store with invalid alias");
            continue;
        }
        let result = open_configured(root, name, config).and_then(|store| {
            // Opening creates the mirror's tables so the attached schema is complete.
            Mirror::open(store.db_path(), store.schema())?;
            host.attach(store.db_path(), name)?;
            Ok(())
        });
        match result {
            Ok(()) => attached.aliases.push(name.clone()),
            Err(e) => debug!(store = %name, error = %e, "skipping store"),
        }
    }
    Ok(attached)
}

/// Runs one SQL statement with every registered store attached to a fresh
/// in-memory database, then tears the session down.
pub fn query_cross(root: &Path, sql: &str) -> StoreResult<Vec<Record>> {
    let host = Mirror::open_in_memory()?;
    let attached = attach_all_stores(&host, root)?;
    let rows = host.query(sql);
    attached.detach_all();
    Ok(rows?)
}
