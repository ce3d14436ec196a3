//! Filesystem-backed remote store.
//!
//! Stands in for a real object store bucket by keeping objects as files under
//! a root directory, with the object id as the relative path. Useful for
//! local development and for sharing a "remote" between processes in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::{RemoteStore, RemoteStoreError};

/// Filesystem [`RemoteStore`] backend rooted at a directory.
pub struct FsRemoteStore {
    root: PathBuf,
}

impl FsRemoteStore {
    /// Create a store rooted at `root` (must be absolute).
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the path is not absolute.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, RemoteStoreError> {
        let root: PathBuf = root.into();
        if !root.is_absolute() {
            return Err(RemoteStoreError::InvalidConfig {
                message: format!("FsRemoteStore root must be absolute: {}", root.display()),
            });
        }
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolve an object id to its path under the root.
    ///
    /// Object ids are slash-separated relative keys; ids that would escape the
    /// root are rejected.
    fn object_path(&self, object_id: &str) -> Result<PathBuf, RemoteStoreError> {
        if object_id.is_empty()
            || object_id.starts_with('/')
            || object_id.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(RemoteStoreError::InvalidConfig {
                message: format!("invalid object id: {object_id:?}"),
            });
        }
        Ok(self.root.join(object_id))
    }

    fn write_atomic(&self, object_id: &str, path: &Path, data: &[u8]) -> Result<(), RemoteStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write atomically (temp file + rename) so readers never observe a
        // partially written object.
        let temp_path: PathBuf = temp_sibling(path);
        std::fs::write(&temp_path, data)?;
        std::fs::rename(&temp_path, path)?;

        debug!(object_id, bytes = data.len(), "stored object");
        Ok(())
    }
}

/// Temp path next to `path`, unique per process so two processes sharing the
/// same root never collide on the staging name.
fn temp_sibling(path: &Path) -> PathBuf {
    let name: String = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}.tmp", name, std::process::id()))
}

#[async_trait]
impl RemoteStore for FsRemoteStore {
    async fn put_bytes(&self, object_id: &str, data: &[u8]) -> Result<(), RemoteStoreError> {
        let path: PathBuf = self.object_path(object_id)?;
        self.write_atomic(object_id, &path, data)
    }

    async fn put_from_file(&self, object_id: &str, source: &Path) -> Result<(), RemoteStoreError> {
        let path: PathBuf = self.object_path(object_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path: PathBuf = temp_sibling(&path);
        std::fs::copy(source, &temp_path)?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    async fn get_bytes(&self, object_id: &str) -> Result<Vec<u8>, RemoteStoreError> {
        let path: PathBuf = self.object_path(object_id)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RemoteStoreError::NotFound {
                    object_id: object_id.to_string(),
                })
            }
            Err(e) => Err(RemoteStoreError::Io(e)),
        }
    }

    async fn get_to_file(&self, object_id: &str, dest: &Path) -> Result<(), RemoteStoreError> {
        let path: PathBuf = self.object_path(object_id)?;
        match std::fs::copy(&path, dest) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RemoteStoreError::NotFound {
                    object_id: object_id.to_string(),
                })
            }
            Err(e) => Err(RemoteStoreError::Io(e)),
        }
    }

    async fn exists(&self, object_id: &str) -> Result<bool, RemoteStoreError> {
        let path: PathBuf = self.object_path(object_id)?;
        Ok(path.is_file())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteStoreError> {
        let mut keys: Vec<String> = Vec::new();

        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel: &Path = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let key: String = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Skip in-flight temp files.
            if key.ends_with(".tmp") {
                continue;
            }
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, object_id: &str) -> Result<(), RemoteStoreError> {
        let path: PathBuf = self.object_path(object_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RemoteStoreError::Io(e)),
        }
    }
}
