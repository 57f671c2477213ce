use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::collision::is_occupied;
use crate::error::{Error, Result};
use crate::paths::destination_in;

/// One CSV row: field name to value, in insertion order.
pub type CsvRecord = serde_json::Map<String, Value>;

pub const DEFAULT_CSV_FILE: &str = "temp.csv";
pub const DEFAULT_CSV_DIRECTORY: &str = "CSV_DATA";

fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn keys_of(record: &CsvRecord) -> Vec<String> {
    record.keys().cloned().collect()
}

// Header row of an existing file; None when the file has no rows yet.
fn existing_header(path: &Path) -> Result<Option<Vec<String>>> {
    if fs::metadata(path)?.len() == 0 {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_path(path)?;
    match reader.records().next() {
        Some(row) => Ok(Some(row?.iter().map(str::to_string).collect())),
        None => Ok(None),
    }
}

/// Append `records` to `directory/<sanitized file_name>`, writing the header
/// first when the file is new. Returns the CSV path.
///
/// Every record must have the same fields in the same order, and they must
/// match the header of an existing file; otherwise nothing is written and
/// `SchemaMismatch` is returned. An empty batch writes nothing.
pub fn append_records(records: &[CsvRecord], file_name: &str, directory: &Path) -> Result<PathBuf> {
    let path = destination_in(file_name, directory)?;
    let Some(first) = records.first() else {
        debug!(path = %path.display(), "empty batch, nothing to append");
        return Ok(path);
    };
    let header = keys_of(first);
    for record in &records[1..] {
        let found = keys_of(record);
        if found != header {
            return Err(Error::SchemaMismatch { path, expected: header, found });
        }
    }

    let established = if is_occupied(&path) { existing_header(&path)? } else { None };
    if let Some(existing) = &established {
        if *existing != header {
            return Err(Error::SchemaMismatch { path, expected: existing.clone(), found: header });
        }
    }

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut writer = csv::WriterBuilder::new().from_writer(file);
    if established.is_none() {
        writer.write_record(&header)?;
    }
    for record in records {
        writer.write_record(record.values().map(field_text))?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = records.len(), "appended csv records");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> CsvRecord {
        v.as_object().cloned().unwrap()
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn two_appends_share_one_header() {
        let dir = tempfile::tempdir().unwrap();
        append_records(&[record(json!({"a": 1, "b": 2}))], "data.csv", dir.path()).unwrap();
        let path = append_records(&[record(json!({"a": 3, "b": 4}))], "data.csv", dir.path()).unwrap();
        assert_eq!(lines(&path), vec!["a,b", "1,2", "3,4"]);
    }

    #[test]
    fn header_follows_first_record_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = append_records(&[record(json!({"zeta": "z", "alpha": "a"}))], "order.csv", dir.path()).unwrap();
        assert_eq!(lines(&path), vec!["zeta,alpha", "z,a"]);
    }

    #[test]
    fn mismatched_existing_header_is_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = append_records(&[record(json!({"a": 1, "b": 2}))], "data.csv", dir.path()).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let err = append_records(&[record(json!({"a": 1, "c": 2}))], "data.csv", dir.path()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }), "{err:?}");
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn reordered_keys_are_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        append_records(&[record(json!({"a": 1, "b": 2}))], "data.csv", dir.path()).unwrap();
        let err = append_records(&[record(json!({"b": 2, "a": 1}))], "data.csv", dir.path()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn inconsistent_batch_is_rejected_before_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let batch = [record(json!({"a": 1})), record(json!({"b": 2}))];
        let err = append_records(&batch, "new.csv", dir.path()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
        assert!(!dir.path().join("new.csv").exists());
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = append_records(&[], "empty.csv", dir.path()).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn values_are_rendered_and_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let rec = record(json!({"name": "Smith, J", "ok": true, "n": 1.5, "missing": null}));
        let path = append_records(&[rec], "mixed.csv", dir.path()).unwrap();
        assert_eq!(lines(&path), vec!["name,ok,n,missing", "\"Smith, J\",true,1.5,"]);
    }

    #[test]
    fn file_name_is_sanitized_and_directory_created() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(DEFAULT_CSV_DIRECTORY);
        let path = append_records(&[record(json!({"a": 1}))], "my-data?.csv", &target).unwrap();
        assert_eq!(path, target.join("mydata.csv"));
    }
}
