// src/watermark.rs
// Durable per-device resume position. The orchestrator calls `persist`
// after every individually successful push, before the next punch, which
// bounds crash re-work to a single in-flight punch.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::types::{format_punch_timestamp, parse_punch_timestamp};

/// Key → last-successful-push timestamp, keyed per device id.
pub trait WatermarkStore: Send {
    /// Stored watermark for `key`, if present and parseable. An
    /// unparseable stored value is treated as absent so the run falls
    /// back to the configured import start.
    fn get(&self, key: &str) -> Option<NaiveDateTime>;

    fn set(&mut self, key: &str, ts: NaiveDateTime);

    /// Durable flush. Must be called synchronously after every `set`
    /// that follows a successful push.
    fn persist(&mut self) -> Result<()>;
}

/// Watermark store key for one device.
pub fn device_key(device_id: &str) -> String {
    format!("{device_id}_last_success_push")
}

/// JSON-file backed store: one document of key → `YYYY-MM-DD HH:MM:SS`
/// strings. Writes go through a temp file + rename so a crash mid-write
/// never truncates the previous state.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store, loading existing state when the file is present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading watermark store {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing watermark store {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    fn write_atomic(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<NaiveDateTime> {
        self.entries
            .get(key)
            .and_then(|raw| parse_punch_timestamp(raw).ok())
    }

    fn set(&mut self, key: &str, ts: NaiveDateTime) {
        self.entries
            .insert(key.to_string(), format_punch_timestamp(&ts));
    }

    fn persist(&mut self) -> Result<()> {
        self.write_atomic()
    }
}

/// In-memory store for tests and dry runs; `persist` is a no-op.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, NaiveDateTime>,
    pub persist_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryStore {
    fn get(&self, key: &str) -> Option<NaiveDateTime> {
        self.entries.get(key).copied()
    }

    fn set(&mut self, key: &str, ts: NaiveDateTime) {
        self.entries.insert(key.to_string(), ts);
    }

    fn persist(&mut self) -> Result<()> {
        self.persist_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_punch_timestamp(s).unwrap()
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set(&device_key("D1"), ts("2024-01-02 17:00:00"));
        store.persist().unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(&device_key("D1")),
            Some(ts("2024-01-02 17:00:00"))
        );
        assert_eq!(reopened.get(&device_key("D2")), None);
    }

    #[test]
    fn unparseable_value_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, r#"{"D1_last_success_push": "not a date"}"#).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get(&device_key("D1")), None);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.get(&device_key("D1")), None);
    }

    #[test]
    fn keys_are_independent_per_device() {
        let mut store = MemoryStore::new();
        store.set(&device_key("D1"), ts("2024-01-02 08:00:00"));
        store.set(&device_key("D2"), ts("2024-01-03 09:00:00"));
        assert_eq!(store.get(&device_key("D1")), Some(ts("2024-01-02 08:00:00")));
        assert_eq!(store.get(&device_key("D2")), Some(ts("2024-01-03 09:00:00")));
    }
}
