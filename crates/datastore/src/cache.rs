//! Local cache layout for fetched artifacts.
//!
//! The cache mirrors the remote naming convention exactly:
//! `<root>/<store>/<group>/<name>-v{n}` for files and `.../<name>-d{n}` for
//! directory trees. Existence of the final path is the sole coherence signal.
//! Artifacts are immutable per version, so a present entry is permanently
//! valid and no staleness check is ever performed.

use std::path::PathBuf;

use crate::error::DatastoreError;
use crate::key::{RemoteObjectId, StoreId};

/// Options for cache placement.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Root directory under which all stores cache their entries.
    pub root: PathBuf,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("versioned-datastore"),
        }
    }
}

impl CacheOptions {
    /// Create options with a custom cache root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Pure mapping from object ids to local cache paths for one store.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
    store: StoreId,
}

impl CacheLayout {
    /// Create the layout for a store under a cache root.
    pub fn new(options: CacheOptions, store: StoreId) -> Self {
        Self {
            root: options.root,
            store,
        }
    }

    /// Directory holding every cache entry of this store.
    pub fn store_root(&self) -> PathBuf {
        self.root.join(self.store.name())
    }

    /// Canonical local path for an object id.
    ///
    /// Deterministic and collision-free; the target itself may not exist yet.
    pub fn entry_path(&self, object_id: &RemoteObjectId) -> PathBuf {
        let mut path: PathBuf = self.store_root();
        for segment in object_id.as_str().split('/') {
            path.push(segment);
        }
        path
    }

    /// Delete every cache entry of this store. The remote is untouched.
    pub fn wipe(&self) -> Result<(), DatastoreError> {
        let store_root: PathBuf = self.store_root();
        match std::fs::remove_dir_all(&store_root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DatastoreError::Io(e)),
        }
    }
}
