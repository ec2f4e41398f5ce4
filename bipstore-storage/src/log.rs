//! The JSONL log: one JSON object per line.
//!
//! Appends are plain `O_APPEND` writes without fsync. Whole-file rewrites go
//! through a synced temp file in the same directory and an atomic rename, so
//! a failed rewrite never leaves a partially written log behind.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use bipstore_model::{Record, key_string};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

/// Longest line the reader accepts (1 MiB).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reads every record in the log. A missing file reads as empty.
///
/// Blank lines are skipped. A line over [`MAX_LINE_BYTES`] or one that is
/// not a JSON object fails the whole read, naming its 1-based line number.
pub fn read_all_records(path: &Path) -> StoreResult<Vec<Record>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut line = 0;
    loop {
        buf.clear();
        let n = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        line += 1;

        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else if buf.len() > MAX_LINE_BYTES {
            return Err(StoreError::LineTooLong {
                line,
                limit: MAX_LINE_BYTES,
            });
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let record = serde_json::from_slice(&buf)
            .map_err(|source| StoreError::Parse { line, source })?;
        records.push(record);
    }
    Ok(records)
}

/// Appends one record as a single line, creating the file if needed.
///
/// Does not check for duplicate keys.
pub fn append_record(path: &Path, record: &Record) -> StoreResult<()> {
    let mut data = serde_json::to_vec(record)?;
    data.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&data)?;
    Ok(())
}

/// Replaces the log with `records`, atomically.
///
/// Writes a temp file next to `path`, syncs it, then renames it over
/// `path`. On failure the temp file is removed and `path` is untouched.
pub fn write_all_records(path: &Path, records: &[Record]) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .suffix(".jsonl")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Hex SHA-256 of the log's bytes. A missing file hashes as empty content.
pub fn compute_hash(path: &Path) -> StoreResult<String> {
    let mut hasher = Sha256::new();
    match File::open(path) {
        Ok(mut file) => {
            io::copy(&mut file, &mut hasher)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(hex::encode(hasher.finalize()))
}

/// True if any record's `pk_field` has the key string `key`.
pub fn contains_key(path: &Path, pk_field: &str, key: &str) -> StoreResult<bool> {
    let records = read_all_records(path)?;
    Ok(records
        .iter()
        .any(|r| key_string(r.get(pk_field).unwrap_or(&Value::Null)) == key))
}
