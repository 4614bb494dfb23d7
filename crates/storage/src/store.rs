//! Snapshot persistence.

use crate::error::Result;
use crate::record::ModelSnapshot;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads and saves model snapshots.
pub trait Store {
    /// Returns the last saved snapshot, if any.
    fn load(&self) -> Result<Option<ModelSnapshot>>;

    /// Replaces the stored snapshot.
    fn save(&self, snapshot: &ModelSnapshot) -> Result<()>;
}

/// Keeps the last snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RefCell<Option<ModelSnapshot>>,
    saves: Cell<usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with a snapshot.
    pub fn with_snapshot(snapshot: ModelSnapshot) -> Self {
        Self {
            snapshot: RefCell::new(Some(snapshot)),
            saves: Cell::new(0),
        }
    }

    /// Number of saves performed.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Option<ModelSnapshot>> {
        Ok(self.snapshot.borrow().clone())
    }

    fn save(&self, snapshot: &ModelSnapshot) -> Result<()> {
        *self.snapshot.borrow_mut() = Some(snapshot.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// Stores the snapshot as pretty-printed JSON in a single file.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store backed by `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> Result<Option<ModelSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let snapshot: ModelSnapshot = serde_json::from_str(&text)?;
        debug!(
            path = %self.path.display(),
            tables = snapshot.tables.len(),
            classes = snapshot.classes.len(),
            "loaded snapshot"
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &ModelSnapshot) -> Result<()> {
        let text = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, text)?;
        debug!(path = %self.path.display(), "saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{TableKindRecord, TableRecord};

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);

        let mut snapshot = ModelSnapshot::new("m");
        snapshot.tables.push(TableRecord::new(1, TableKindRecord::Connected));
        store.save(&snapshot).unwrap();

        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_json_file_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), None);
    }
}
