//! DDL generation from a [`Schema`].

use bipstore_model::{FieldType, Schema};

/// DDL for the checkpoint table. Independent of any schema.
pub const META_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS _meta (
  key TEXT PRIMARY KEY,
  value TEXT
)";

/// SQLite column type for a field type.
pub fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String | FieldType::Date | FieldType::Datetime | FieldType::Json => "TEXT",
        FieldType::Integer | FieldType::Boolean => "INTEGER",
        FieldType::Float => "REAL",
    }
}

/// `CREATE TABLE` for the schema's main table.
pub fn create_table_sql(schema: &Schema) -> String {
    let cols: Vec<String> = schema
        .fields
        .iter()
        .map(|(name, field)| {
            let mut col = format!("{name} {}", column_type(field.field_type));
            if field.primary {
                col.push_str(" PRIMARY KEY");
            }
            col
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        schema.name,
        cols.join(",\n  ")
    )
}

/// `CREATE INDEX` for one field.
pub fn create_index_sql(table: &str, field: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_{field} ON {table}({field})")
}

/// `CREATE VIRTUAL TABLE ... USING fts5` covering the primary key and every
/// `fts` field, or `None` when the schema has no `fts` fields.
pub fn create_fts_sql(schema: &Schema) -> Option<String> {
    if !schema.has_fts() {
        return None;
    }
    let mut cols = vec![schema.primary_key_field()];
    cols.extend(schema.fts_fields());

    Some(format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5(\n  {}\n)",
        schema.fts_table(),
        cols.join(",\n  ")
    ))
}
