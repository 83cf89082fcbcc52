//! Saved Query Store - name → raw query text with JSON persistence
//!
//! Holds the text behind `save:<name>` / `load:<name>` plus a bounded history
//! of executed queries. Every mutation is a read-modify-write under one
//! `Mutex` and, for file-backed stores, is written through immediately.
//!
//! # File Format
//! ```json
//! {
//!   "version": 1,
//!   "queries": { "weekly": "tasks due:eow save:weekly" },
//!   "history": ["tasks p1", "projects metrics:task_count"]
//! }
//! ```

use crate::store::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Format version written to the store file
pub const STORE_VERSION: u32 = 1;

/// Default number of history entries kept
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// A named query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub name: String,
    /// Query text exactly as it was submitted
    pub raw_text: String,
}

/// Serialization format for JSON persistence
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    version: u32,
    #[serde(default)]
    queries: BTreeMap<String, String>,
    #[serde(default)]
    history: Vec<String>,
}

/// Name → text store for saved queries
#[derive(Debug)]
pub struct SavedQueryStore {
    data: Mutex<StoreData>,
    /// `None` for in-memory stores
    path: Option<PathBuf>,
    history_limit: usize,
}

impl SavedQueryStore {
    /// Open a store file, creating an empty store if it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let data = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            StoreData {
                version: STORE_VERSION,
                ..Default::default()
            }
        };
        debug!(path = %path.display(), queries = data.queries.len(), "Opened saved query store");

        Ok(Self {
            data: Mutex::new(data),
            path: Some(path),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            data: Mutex::new(StoreData {
                version: STORE_VERSION,
                ..Default::default()
            }),
            path: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Builder: bound the run history
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    fn load_from_file(path: &Path) -> StoreResult<StoreData> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        serde_json::from_reader(reader).map_err(|e| {
            StoreError::Serialization(format!("Failed to load saved queries: {}", e))
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreData>> {
        self.data
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire store lock: {}", e)))
    }

    /// Write the current state through to disk
    fn persist(&self, data: &StoreData) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, data).map_err(|e| {
            StoreError::Serialization(format!("Failed to persist saved queries: {}", e))
        })
    }

    /// Store `raw_text` under `name`, replacing any previous entry
    pub fn save(&self, name: &str, raw_text: &str) -> StoreResult<()> {
        let mut data = self.lock()?;
        let previous = data.queries.insert(name.to_string(), raw_text.to_string());
        if previous.as_deref() == Some(raw_text) {
            return Ok(());
        }
        self.persist(&data)?;
        info!(name = %name, replaced = previous.is_some(), "Saved query");
        Ok(())
    }

    /// Raw text stored under `name`
    pub fn load(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self.lock()?.queries.get(name).cloned())
    }

    /// All saved queries, sorted by name
    pub fn list(&self) -> StoreResult<Vec<SavedQuery>> {
        Ok(self
            .lock()?
            .queries
            .iter()
            .map(|(name, raw_text)| SavedQuery {
                name: name.clone(),
                raw_text: raw_text.clone(),
            })
            .collect())
    }

    /// Saved query names, sorted
    pub fn names(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.queries.keys().cloned().collect())
    }

    /// Delete a saved query; returns whether it existed
    pub fn remove(&self, name: &str) -> StoreResult<bool> {
        let mut data = self.lock()?;
        if data.queries.remove(name).is_none() {
            return Ok(false);
        }
        self.persist(&data)?;
        info!(name = %name, "Removed saved query");
        Ok(true)
    }

    /// Append to the run history, dropping the oldest entries past the limit
    pub fn record_history(&self, raw_text: &str) -> StoreResult<()> {
        if self.history_limit == 0 {
            return Ok(());
        }
        let mut data = self.lock()?;
        data.history.push(raw_text.to_string());
        let overflow = data.history.len().saturating_sub(self.history_limit);
        data.history.drain(..overflow);
        self.persist(&data)
    }

    /// Run history, oldest first
    pub fn history(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.history.clone())
    }

    /// Get the persistence file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let store = SavedQueryStore::in_memory();
        store.save("weekly", "tasks due:eow save:weekly").unwrap();

        assert_eq!(
            store.load("weekly").unwrap().as_deref(),
            Some("tasks due:eow save:weekly")
        );
        assert_eq!(store.load("missing").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites() {
        let store = SavedQueryStore::in_memory();
        store.save("mine", "tasks p1").unwrap();
        store.save("mine", "tasks p2").unwrap();
        assert_eq!(store.load("mine").unwrap().as_deref(), Some("tasks p2"));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_sorted_and_remove() {
        let store = SavedQueryStore::in_memory();
        store.save("zeta", "tasks").unwrap();
        store.save("alpha", "projects").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|q| q.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        assert!(store.remove("alpha").unwrap());
        assert!(!store.remove("alpha").unwrap());
        assert_eq!(store.names().unwrap(), vec!["zeta"]);
    }

    #[test]
    fn test_history_bounded() {
        let store = SavedQueryStore::in_memory().history_limit(2);
        store.record_history("tasks p1").unwrap();
        store.record_history("tasks p2").unwrap();
        store.record_history("tasks p3").unwrap();
        assert_eq!(store.history().unwrap(), vec!["tasks p2", "tasks p3"]);

        let disabled = SavedQueryStore::in_memory().history_limit(0);
        disabled.record_history("tasks").unwrap();
        assert!(disabled.history().unwrap().is_empty());
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("queries.json");

        {
            let store = SavedQueryStore::open(&path).unwrap();
            store.save("weekly", "tasks due:eow").unwrap();
            store.record_history("tasks due:eow").unwrap();
        }

        let store = SavedQueryStore::open(&path).unwrap();
        assert_eq!(store.load("weekly").unwrap().as_deref(), Some("tasks due:eow"));
        assert_eq!(store.history().unwrap(), vec!["tasks due:eow"]);
        assert_eq!(store.path(), Some(path.as_path()));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"version\": 1"));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queries.json");
        std::fs::write(&path, "not json").unwrap();

        let err = SavedQueryStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
