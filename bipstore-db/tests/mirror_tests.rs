use bipstore_db::{Mirror, MirrorError, from_sql, prepare_fts_query, to_sql};
use bipstore_model::{Field, FieldType, Record, Schema};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Value, json};
use tempfile::TempDir;

fn schema() -> Schema {
    Schema::new("notes")
        .field("id", Field::primary(FieldType::String))
        .field("title", Field::new(FieldType::String).searchable())
        .field("count", Field::new(FieldType::Integer).indexed())
        .field("done", Field::new(FieldType::Boolean))
        .field("meta", Field::new(FieldType::Json))
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn sample() -> Vec<Record> {
    vec![
        record(json!({"id": "a", "title": "quarterly planning notes", "count": 3, "done": true, "meta": {"k": 1}})),
        record(json!({"id": "b", "title": "grocery list", "count": 4.0, "done": false, "meta": "raw"})),
        record(json!({"id": "c", "title": "planning poker", "extra": "ignored"})),
    ]
}

fn open(dir: &TempDir) -> Mirror {
    Mirror::open(&dir.path().join("notes.db"), &schema()).unwrap()
}

fn synced_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()
}

// ── Checkpoint ───────────────────────────────────────────────────

#[test]
fn fresh_mirror_has_no_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = open(&dir);
    assert_eq!(mirror.stored_hash().unwrap(), None);
    assert_eq!(mirror.last_sync().unwrap(), None);
}

#[test]
fn checkpoint_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = open(&dir);
    mirror.set_stored_hash("abc123").unwrap();
    mirror.set_stored_hash("def456").unwrap();
    mirror.set_last_sync(synced_at()).unwrap();

    assert_eq!(mirror.stored_hash().unwrap().as_deref(), Some("def456"));
    assert_eq!(mirror.last_sync().unwrap(), Some(synced_at()));
}

#[test]
fn corrupt_last_sync_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = open(&dir);
    mirror
        .connection()
        .execute(
            "INSERT INTO _meta (key, value) VALUES ('last_sync', 'yesterday')",
            [],
        )
        .unwrap();
    assert!(matches!(
        mirror.last_sync(),
        Err(MirrorError::InvalidTimestamp { .. })
    ));
}

#[test]
fn reopen_keeps_tables_and_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut mirror = open(&dir);
        mirror.rebuild(&schema(), &sample(), "h1", synced_at()).unwrap();
    }
    let mirror = open(&dir);
    assert_eq!(mirror.stored_hash().unwrap().as_deref(), Some("h1"));
    assert_eq!(mirror.query("SELECT id FROM notes").unwrap().len(), 3);
}

// ── Rebuild ──────────────────────────────────────────────────────

#[test]
fn rebuild_inserts_and_converts() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = open(&dir);
    let n = mirror.rebuild(&schema(), &sample(), "h1", synced_at()).unwrap();
    assert_eq!(n, 3);

    let rows = mirror
        .query("SELECT id, count, done, meta FROM notes ORDER BY id")
        .unwrap();
    assert_eq!(rows[0], record(json!({"id": "a", "count": 3, "done": 1, "meta": "{\"k\":1}"})));
    assert_eq!(rows[1], record(json!({"id": "b", "count": 4, "done": 0, "meta": "raw"})));
    assert_eq!(rows[2], record(json!({"id": "c", "count": null, "done": null, "meta": null})));
}

#[test]
fn rebuild_replaces_previous_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = open(&dir);
    mirror.rebuild(&schema(), &sample(), "h1", synced_at()).unwrap();
    mirror
        .rebuild(&schema(), &sample()[..1], "h2", synced_at())
        .unwrap();

    assert_eq!(mirror.query("SELECT * FROM notes").unwrap().len(), 1);
    assert_eq!(mirror.search(&schema(), "grocery").unwrap().len(), 0);
    assert_eq!(mirror.stored_hash().unwrap().as_deref(), Some("h2"));
}

#[test]
fn failed_rebuild_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = open(&dir);
    mirror.rebuild(&schema(), &sample(), "h1", synced_at()).unwrap();

    // Two rows with the same primary key violate the table constraint.
    let dupes = vec![record(json!({"id": "x"})), record(json!({"id": "x"}))];
    let err = mirror.rebuild(&schema(), &dupes, "h2", synced_at()).unwrap_err();
    assert!(format!("{err}").contains("inserting record 2"));

    assert_eq!(mirror.query("SELECT * FROM notes").unwrap().len(), 3);
    assert_eq!(mirror.stored_hash().unwrap().as_deref(), Some("h1"));
}

#[test]
fn rebuild_without_fts_fields() {
    let plain = Schema::new("plain")
        .field("id", Field::primary(FieldType::Integer))
        .field("n", Field::new(FieldType::Float));
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = Mirror::open(&dir.path().join("plain.db"), &plain).unwrap();
    let rows = vec![record(json!({"id": 1, "n": 1.5})), record(json!({"id": 2}))];
    assert_eq!(mirror.rebuild(&plain, &rows, "h", synced_at()).unwrap(), 2);

    let tables = mirror
        .query("SELECT name FROM sqlite_master WHERE name = 'plain_fts'")
        .unwrap();
    assert!(tables.is_empty());
    assert!(matches!(
        mirror.search(&plain, "x"),
        Err(MirrorError::NoFullTextIndex(_))
    ));
}

// ── Queries ──────────────────────────────────────────────────────

#[test]
fn query_count_returns_integer() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = open(&dir);
    mirror.rebuild(&schema(), &sample(), "h", synced_at()).unwrap();
    let rows = mirror
        .query("SELECT COUNT(*) AS cnt FROM notes WHERE done = 1")
        .unwrap();
    assert_eq!(rows, vec![record(json!({"cnt": 1}))]);
}

#[test]
fn query_error_has_context() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = open(&dir);
    let err = mirror.query("SELECT * FROM missing_table").unwrap_err();
    assert!(matches!(err, MirrorError::Query { .. }));
    assert!(format!("{err}").starts_with("executing query"));
}

#[test]
fn select_keys_matches_predicate() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = open(&dir);
    mirror.rebuild(&schema(), &sample(), "h", synced_at()).unwrap();
    let mut keys = mirror.select_keys(&schema(), "count >= 3").unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
    assert!(mirror.select_keys(&schema(), "count > 100").unwrap().is_empty());
}

#[test]
fn search_matches_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = open(&dir);
    mirror.rebuild(&schema(), &sample(), "h", synced_at()).unwrap();

    let mut ids: Vec<Value> = mirror
        .search(&schema(), "planning")
        .unwrap()
        .into_iter()
        .map(|r| r["id"].clone())
        .collect();
    ids.sort_by_key(|v| v.to_string());
    assert_eq!(ids, vec![json!("a"), json!("c")]);
}

// ── Federation ───────────────────────────────────────────────────

#[test]
fn attach_and_detach() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut mirror = open(&dir);
        mirror.rebuild(&schema(), &sample(), "h", synced_at()).unwrap();
    }

    let host = Mirror::open_in_memory().unwrap();
    host.attach(&dir.path().join("notes.db"), "n").unwrap();
    let rows = host.query("SELECT COUNT(*) AS cnt FROM n.notes").unwrap();
    assert_eq!(rows[0]["cnt"], json!(3));

    host.detach("n").unwrap();
    assert!(host.query("SELECT * FROM n.notes").is_err());
}

#[test]
fn attach_rejects_bad_alias() {
    let host = Mirror::open_in_memory().unwrap();
    assert!(matches!(
        host.attach(std::path::Path::new("x.db"), "a; DROP"),
        Err(MirrorError::InvalidAlias(_))
    ));
}

// ── Helpers ──────────────────────────────────────────────────────

#[test]
fn fts_query_quoting() {
    assert_eq!(prepare_fts_query("  planning  "), "planning");
    assert_eq!(prepare_fts_query(""), "");
    assert_eq!(prepare_fts_query("foo-bar"), "\"foo-bar\"");
    assert_eq!(prepare_fts_query("say \"hi\"*"), "\"say \"\"hi\"\"*\"");
}

#[test]
fn value_conversions() {
    assert_eq!(to_sql(None, FieldType::String), SqlValue::Null);
    assert_eq!(to_sql(Some(&json!(true)), FieldType::Boolean), SqlValue::Integer(1));
    assert_eq!(to_sql(Some(&json!(true)), FieldType::Json), SqlValue::Text("true".into()));
    assert_eq!(to_sql(Some(&json!([1, 2])), FieldType::Json), SqlValue::Text("[1,2]".into()));
    assert_eq!(to_sql(Some(&json!(5.0)), FieldType::Integer), SqlValue::Integer(5));
    assert_eq!(to_sql(Some(&json!(5.5)), FieldType::Float), SqlValue::Real(5.5));

    assert_eq!(from_sql(ValueRef::Integer(7)), json!(7));
    assert_eq!(from_sql(ValueRef::Real(1.25)), json!(1.25));
    assert_eq!(from_sql(ValueRef::Text(b"hi")), json!("hi"));
    assert_eq!(from_sql(ValueRef::Blob(&[1, 255])), json!([1, 255]));
    assert_eq!(from_sql(ValueRef::Null), Value::Null);
}
