//! Catalog snapshot store
//!
//! The server reads prescriptions and catalogs from a JSON snapshot exported
//! by the backend. The parsed snapshot is kept in a [`TtlCache`] and re-read
//! from disk once it expires.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::nutrition::CatalogSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("snapshot cache lock poisoned")]
    LockPoisoned,
}

/// Reads and parses a snapshot file
pub fn load_snapshot(path: &Path) -> Result<CatalogSnapshot, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: CatalogSnapshot =
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    info!(
        path = %path.display(),
        prescriptions = snapshot.prescriptions.len(),
        formulas = snapshot.formulas.len(),
        modules = snapshot.modules.len(),
        supplies = snapshot.supplies.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    cache: Mutex<TtlCache<PathBuf, Arc<CatalogSnapshot>>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        SnapshotStore {
            path: path.into(),
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot, re-reading the file when the cached copy expired
    pub fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, StoreError> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::LockPoisoned)?;
        cache.get_or_refresh(self.path.clone(), || {
            debug!(path = %self.path.display(), "snapshot cache miss");
            load_snapshot(&self.path).map(Arc::new)
        })
    }

    /// Drops the cached copy so the next read goes to disk
    pub fn invalidate(&self) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::LockPoisoned)?;
        cache.invalidate(&self.path);
        Ok(())
    }

    /// Seeds the cache with an in-memory snapshot
    pub fn prime(&self, snapshot: CatalogSnapshot) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::LockPoisoned)?;
        cache.insert(self.path.clone(), Arc::new(snapshot));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("nutriward-{}-{}.json", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reads_snapshot_once_within_ttl() {
        let path = temp_file("ttl", r#"{"formulas": [{"id": "f-1", "name": "Standard"}]}"#);
        let store = SnapshotStore::new(&path, Duration::from_secs(300));

        assert_eq!(store.snapshot().unwrap().formulas.len(), 1);

        fs::write(&path, r#"{"formulas": []}"#).unwrap();
        assert_eq!(store.snapshot().unwrap().formulas.len(), 1);

        store.invalidate().unwrap();
        assert!(store.snapshot().unwrap().formulas.is_empty());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let missing = SnapshotStore::new("/nonexistent/nutriward.json", Duration::from_secs(1));
        assert!(matches!(missing.snapshot(), Err(StoreError::Io { .. })));

        let path = temp_file("bad", "{not json");
        let store = SnapshotStore::new(&path, Duration::from_secs(1));
        assert!(matches!(store.snapshot(), Err(StoreError::Parse { .. })));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_primed_snapshot_skips_disk() {
        let store = SnapshotStore::new("/nonexistent/nutriward.json", Duration::from_secs(60));
        store.prime(CatalogSnapshot::default()).unwrap();
        assert!(store.snapshot().unwrap().prescriptions.is_empty());
    }
}
