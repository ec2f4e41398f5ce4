use std::path::Path;

use bipstore_model::{Record, Schema, is_valid_identifier, key_string};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Params, Statement, params, params_from_iter};
use tracing::debug;

use crate::convert::{from_sql, to_sql};
use crate::ddl::{META_TABLE_SQL, create_fts_sql, create_index_sql, create_table_sql};
use crate::error::{MirrorError, MirrorResult};
use crate::{META_JSONL_HASH, META_LAST_SYNC};

/// A store's SQLite mirror, backed by a single connection.
pub struct Mirror {
    conn: Connection,
}

impl Mirror {
    /// Opens (or creates) the mirror at `path` and ensures its tables exist.
    pub fn open(path: &Path, schema: &Schema) -> MirrorResult<Self> {
        let conn = Connection::open(path)?;
        let mirror = Self { conn };
        mirror.create_tables(schema)?;
        Ok(mirror)
    }

    /// Opens a private in-memory database with no tables, used as the host
    /// connection for cross-store queries.
    pub fn open_in_memory() -> MirrorResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the main table, its indexes, the FTS table (if any) and
    /// `_meta`. Safe to call repeatedly.
    pub fn create_tables(&self, schema: &Schema) -> MirrorResult<()> {
        self.conn
            .execute_batch(&create_table_sql(schema))
            .map_err(MirrorError::query("creating main table"))?;

        for field in schema.indexed_fields() {
            self.conn
                .execute_batch(&create_index_sql(&schema.name, field))
                .map_err(MirrorError::query(format!("creating index for {field}")))?;
        }

        if let Some(fts) = create_fts_sql(schema) {
            self.conn
                .execute_batch(&fts)
                .map_err(MirrorError::query("creating FTS table"))?;
        }

        self.conn
            .execute_batch(META_TABLE_SQL)
            .map_err(MirrorError::query("creating meta table"))?;
        Ok(())
    }

    // ── Sync checkpoint ──────────────────────────────────────────

    /// Hash of the log this mirror was last rebuilt from.
    pub fn stored_hash(&self) -> MirrorResult<Option<String>> {
        get_meta(&self.conn, META_JSONL_HASH)
    }

    pub fn set_stored_hash(&self, hash: &str) -> MirrorResult<()> {
        set_meta(&self.conn, META_JSONL_HASH, hash)
    }

    /// Time of the last successful rebuild.
    pub fn last_sync(&self) -> MirrorResult<Option<DateTime<Utc>>> {
        let Some(value) = get_meta(&self.conn, META_LAST_SYNC)? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&value)
            .map_err(|source| MirrorError::InvalidTimestamp { value, source })?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    pub fn set_last_sync(&self, at: DateTime<Utc>) -> MirrorResult<()> {
        set_meta(&self.conn, META_LAST_SYNC, &format_timestamp(at))
    }

    // ── Rebuild ──────────────────────────────────────────────────

    /// Replaces the mirror's contents with `records` and records the new
    /// checkpoint, all in one transaction. Returns the number of records
    /// inserted.
    ///
    /// On error the transaction rolls back and the mirror keeps its previous
    /// rows and checkpoint.
    pub fn rebuild(
        &mut self,
        schema: &Schema,
        records: &[Record],
        hash: &str,
        synced_at: DateTime<Utc>,
    ) -> MirrorResult<usize> {
        let tx = self.conn.transaction()?;

        tx.execute(&format!("DELETE FROM {}", schema.name), [])
            .map_err(MirrorError::query("clearing main table"))?;
        if schema.has_fts() {
            tx.execute(&format!("DELETE FROM {}", schema.fts_table()), [])
                .map_err(MirrorError::query("clearing FTS table"))?;
        }

        {
            let columns = schema.fields.keys().map(String::as_str);
            let mut insert = tx.prepare(&insert_sql(&schema.name, columns))?;
            let mut insert_fts = if schema.has_fts() {
                let columns = std::iter::once(schema.primary_key_field()).chain(schema.fts_fields());
                Some(tx.prepare(&insert_sql(&schema.fts_table(), columns))?)
            } else {
                None
            };

            for (i, record) in records.iter().enumerate() {
                let values = schema
                    .fields
                    .iter()
                    .map(|(name, field)| to_sql(record.get(name), field.field_type));
                insert
                    .execute(params_from_iter(values))
                    .map_err(MirrorError::query(format!("inserting record {}", i + 1)))?;

                if let Some(stmt) = insert_fts.as_mut() {
                    let pk = schema.primary_key_field();
                    let values = std::iter::once(pk)
                        .chain(schema.fts_fields())
                        .map(|name| to_sql(record.get(name), schema.fields[name].field_type));
                    stmt.execute(params_from_iter(values))
                        .map_err(MirrorError::query(format!("indexing record {}", i + 1)))?;
                }
            }
        }

        set_meta(&tx, META_JSONL_HASH, hash)?;
        set_meta(&tx, META_LAST_SYNC, &format_timestamp(synced_at))?;
        tx.commit()?;

        debug!(table = %schema.name, records = records.len(), "mirror rebuilt");
        Ok(records.len())
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Runs caller-supplied SQL and returns every row as a record keyed by
    /// column name. The SQL is not sandboxed.
    pub fn query(&self, sql: &str) -> MirrorResult<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(MirrorError::query("executing query"))?;
        collect_records(&mut stmt, [])
    }

    /// Primary-key values (as key strings) of the rows matching `predicate`.
    pub fn select_keys(&self, schema: &Schema, predicate: &str) -> MirrorResult<Vec<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {predicate}",
            schema.primary_key_field(),
            schema.name
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(MirrorError::query("finding matching records"))?;
        let keys = stmt
            .query_map([], |row| Ok(key_string(&from_sql(row.get_ref(0)?))))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(MirrorError::query("finding matching records"))?;
        Ok(keys)
    }

    /// Main-table rows whose full-text fields match `text`.
    ///
    /// `text` goes through [`prepare_fts_query`], so operator characters are
    /// matched literally.
    pub fn search(&self, schema: &Schema, text: &str) -> MirrorResult<Vec<Record>> {
        if !schema.has_fts() {
            return Err(MirrorError::NoFullTextIndex(schema.name.clone()));
        }
        let pk = schema.primary_key_field();
        let fts = schema.fts_table();
        let sql = format!(
            "SELECT * FROM {table} WHERE {pk} IN (SELECT {pk} FROM {fts} WHERE {fts} MATCH ?1)",
            table = schema.name,
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(MirrorError::query("full-text search"))?;
        collect_records(&mut stmt, params![prepare_fts_query(text)])
    }

    // ── Federation ───────────────────────────────────────────────

    /// Attaches another database file under `alias`.
    pub fn attach(&self, path: &Path, alias: &str) -> MirrorResult<()> {
        if !is_valid_identifier(alias) {
            return Err(MirrorError::InvalidAlias(alias.to_string()));
        }
        self.conn
            .execute(
                &format!("ATTACH DATABASE ?1 AS {alias}"),
                params![path.to_string_lossy().into_owned()],
            )
            .map_err(MirrorError::query(format!("attaching {alias}")))?;
        Ok(())
    }

    pub fn detach(&self, alias: &str) -> MirrorResult<()> {
        if !is_valid_identifier(alias) {
            return Err(MirrorError::InvalidAlias(alias.to_string()));
        }
        self.conn
            .execute_batch(&format!("DETACH DATABASE {alias}"))
            .map_err(MirrorError::query(format!("detaching {alias}")))?;
        Ok(())
    }
}

/// Quotes an FTS5 query that contains operator characters so it is matched
/// as a literal phrase. Plain queries pass through trimmed.
pub fn prepare_fts_query(query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        return String::new();
    }
    if query.contains(|c| "\"*+-:(){}[]^~".contains(c)) {
        return format!("\"{}\"", query.replace('"', "\"\""));
    }
    query.to_string()
}

fn insert_sql<'a>(table: &str, cols: impl IntoIterator<Item = &'a str>) -> String {
    let cols: Vec<&str> = cols.into_iter().collect();
    let placeholders = vec!["?"; cols.len()].join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        cols.join(", ")
    )
}

fn collect_records<P: Params>(stmt: &mut Statement<'_>, params: P) -> MirrorResult<Vec<Record>> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt
        .query(params)
        .map_err(MirrorError::query("executing query"))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(MirrorError::query("reading rows"))? {
        let mut record = Record::new();
        for (i, name) in columns.iter().enumerate() {
            record.insert(name.clone(), from_sql(row.get_ref(i)?));
        }
        records.push(record);
    }
    Ok(records)
}

fn get_meta(conn: &Connection, key: &str) -> MirrorResult<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM _meta WHERE key = ?1", params![key], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?;
    Ok(value.flatten())
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> MirrorResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO _meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(MirrorError::query(format!("updating {key}")))?;
    Ok(())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
