//! Local fallback store: a single JSON document on disk.
//!
//! The document holds one keyed collection per logical table; every call is
//! a full read-modify-write of the file. This is deliberately simple — the
//! fallback only has to keep data flowing while the primary store is down,
//! not scale.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::StoreError;

/// On-disk shape of the fallback store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Document {
    /// Monotonic id counters, one per table that needs them.
    #[serde(default)]
    pub(crate) counters: BTreeMap<String, i64>,
    /// table name → natural key → record.
    #[serde(default)]
    pub(crate) tables: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Document {
    pub(crate) fn collection_mut(&mut self, table: &str) -> &mut BTreeMap<String, Value> {
        self.tables.entry(table.to_string()).or_default()
    }

    pub(crate) fn next_id(&mut self, table: &str) -> i64 {
        let counter = self.counters.entry(table.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// Flat keyed store persisted as one JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Loads the document; a missing file is an empty store.
    pub(crate) fn read(&self) -> Result<Document, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// One read-modify-write cycle: load, apply `apply`, persist.
    pub(crate) fn update<T>(
        &self,
        apply: impl FnOnce(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut doc = self.read()?;
        let result = apply(&mut doc)?;
        self.write(&doc)?;
        Ok(result)
    }

    fn write(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let content = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, content).map_err(|e| self.io_err(e))
    }

    /// Returns all records of a table in key order.
    pub(crate) fn select_all(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        let doc = self.read()?;
        Ok(doc
            .tables
            .get(table)
            .map(|collection| collection.values().cloned().collect())
            .unwrap_or_default())
    }
}
