//! Durable storage for the recency list.
//!
//! The cache itself never performs I/O; the owner loads once at startup and saves after every
//! mutation through a [`RecencyStore`].

use crate::recency::SuggestionItem;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("recency store I/O failed for {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("recency store contents are malformed")]
    Malformed(#[from] serde_json::Error),
}

pub trait RecencyStore: Send {
    fn load(&self) -> Result<Vec<SuggestionItem>, StoreError>;
    fn save(&mut self, items: &[SuggestionItem]) -> Result<(), StoreError>;
}

/// JSON array of `{id, title, slug, lastUsedAt}` records.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecencyStore for JsonFileStore {
    fn load(&self) -> Result<Vec<SuggestionItem>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(target: "store", path = %self.path.display(), "recency_store_missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        let items: Vec<SuggestionItem> = serde_json::from_str(&content)?;
        debug!(target: "store", path = %self.path.display(), count = items.len(), "recency_store_loaded");
        Ok(items)
    }

    fn save(&mut self, items: &[SuggestionItem]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, json).map_err(|e| self.io_err(e))?;
        debug!(target: "store", path = %self.path.display(), count = items.len(), "recency_store_saved");
        Ok(())
    }
}

/// Volatile store for tests and hosts without persistence.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Vec<SuggestionItem>,
    saves: usize,
}

impl MemoryStore {
    pub fn new(items: Vec<SuggestionItem>) -> Self {
        Self { items, saves: 0 }
    }

    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn items(&self) -> &[SuggestionItem] {
        &self.items
    }
}

impl RecencyStore for MemoryStore {
    fn load(&self) -> Result<Vec<SuggestionItem>, StoreError> {
        Ok(self.items.clone())
    }

    fn save(&mut self, items: &[SuggestionItem]) -> Result<(), StoreError> {
        self.items = items.to_vec();
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("recent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("nested").join("recent.json"));
        let items = vec![
            SuggestionItem::new("b", "Second", "second"),
            SuggestionItem::new("a", "First", "first"),
        ];
        store.save(&items).unwrap();
        assert_eq!(store.load().unwrap(), items);
    }

    #[test]
    fn malformed_file_reports_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "{not json").unwrap();
        let store = JsonFileStore::new(tmp.path());
        assert!(matches!(store.load(), Err(StoreError::Malformed(_))));
    }
}
