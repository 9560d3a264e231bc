//! Key-value persistence collaborator.
//!
//! Values are JSON documents addressed by string keys. A missing key reads as
//! `None`, which every caller treats as an empty collection.

use crate::error::{ErmError, Result};
use crate::types::ActivityRecord;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub trait KeyValueStore {
    /// Read the value stored under `key`. JSON `null` reads as `None`.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`.
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }
}

/// In-process store, used by tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail, leaving stored values untouched.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).filter(|v| !v.is_null()).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if self.fail_writes {
            return Err(ErmError::store(key, "store is rejecting writes"));
        }
        self.values.insert(key.to_string(), value);
        self.writes += 1;
        Ok(())
    }
}

/// Directory-backed store: one pretty-printed `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(|c: char| c == '/' || c == '\\') || key.starts_with('.') {
            return Err(ErmError::store(key, "invalid key"));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            debug!("No value stored for key {}", key);
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&json)?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(&value)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Read the activity log stored under `key`.
///
/// Entries that do not deserialize are skipped; a non-array value reads as an
/// empty log.
pub fn load_activities<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Vec<ActivityRecord>> {
    let entries = match store.get(key)? {
        None => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!(
                "Activity log under {} is not an array ({}), treating as empty",
                key,
                json_kind(&other)
            );
            return Ok(Vec::new());
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;
    for entry in entries {
        match serde_json::from_value::<ActivityRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                debug!("Skipping malformed activity entry: {}", e);
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} malformed activity entries under {}", skipped, key);
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("anything").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_null_reads_as_none() {
        let mut store = MemoryStore::new();
        store.set("k", Value::Null).unwrap();
        assert!(store.get("k").unwrap().is_none());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_memory_store_rejected_write_keeps_old_value() {
        let mut store = MemoryStore::new();
        store.set("k", json!([1])).unwrap();
        store.fail_writes(true);
        assert!(store.set("k", json!([1, 2])).is_err());
        assert_eq!(store.get("k").unwrap(), Some(json!([1])));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_json_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("nested"));

        assert!(store.get("erm_users").unwrap().is_none());
        store.set("erm_users", json!([{"name": "Amy"}])).unwrap();

        let reopened = JsonFileStore::new(dir.path().join("nested"));
        assert_eq!(
            reopened.get("erm_users").unwrap(),
            Some(json!([{"name": "Amy"}]))
        );
    }

    #[test]
    fn test_json_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        assert!(store.set("../escape", json!(1)).is_err());
        assert!(store.get("a/b").is_err());
    }

    #[test]
    fn test_load_activities_skips_malformed_entries() {
        let mut store = MemoryStore::new();
        store
            .set(
                "log",
                json!([
                    {"type": "risk", "action": "created", "user": "Amy", "timestamp": "2024-01-01T09:00:00Z"},
                    "not a record",
                    {"type": "control", "action": "updated", "user": "Beth"}
                ]),
            )
            .unwrap();

        let records = load_activities(&store, "log").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].user.as_deref(), Some("Beth"));
    }

    #[test]
    fn test_load_activities_keeps_records_with_loose_shapes() {
        let mut store = MemoryStore::new();
        store
            .set(
                "log",
                json!([
                    {"type": "risk", "user": "Amy", "userName": "Amy", "timestamp": "2024-01-01T09:00:00Z"},
                    {"type": "risk", "user": "Beth", "workspaceId": 17, "timestamp": "2024-01-01T09:05:00Z"},
                    {"type": "risk", "user": "Cal", "userId": 42, "timestamp": "2024-01-01T09:10:00Z"}
                ]),
            )
            .unwrap();

        let records = load_activities(&store, "log").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].display_name(), "Amy");
        assert_eq!(records[1].workspace_id.as_deref(), Some("17"));
        assert_eq!(records[2].identity(), "42");
        assert!(records.iter().all(|r| r.parsed_timestamp().is_some()));
    }

    #[test]
    fn test_load_activities_tolerates_missing_and_wrong_shape() {
        let mut store = MemoryStore::new();
        assert!(load_activities(&store, "log").unwrap().is_empty());

        store.set("log", json!({"oops": true})).unwrap();
        assert!(load_activities(&store, "log").unwrap().is_empty());
    }
}
