//! Per-key download coordination.
//!
//! Guarantees at most one in-flight remote transfer per object id within a
//! process, while unrelated object ids transfer fully in parallel. Callers
//! hand the coordinator a staging closure that materializes the artifact at a
//! path of the coordinator's choosing; the coordinator owns the existence
//! fast path, the per-key lock, the double-check after acquiring it, and the
//! atomic rename that publishes the finished entry.
//!
//! Cross-process coherence relies on that rename being the sole publication
//! point: a second process racing this one either sees "not yet there" and
//! redundantly downloads into its own staging path, or sees a fully formed
//! entry. It can never see a partial one.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DatastoreError;
use crate::key::RemoteObjectId;

/// Serializes downloads per object id.
///
/// One instance per process (per `Datastore`); the lock registry is purely
/// in-memory and owns no data.
#[derive(Debug, Default)]
pub struct DownloadCoordinator {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DownloadCoordinator {
    /// Create a coordinator with an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an artifact into `final_path`, downloading at most once.
    ///
    /// If `final_path` already exists it is returned immediately. Otherwise
    /// `stage` is invoked with a staging path in the same directory as
    /// `final_path` (same filesystem, so the rename is atomic) and must fully
    /// materialize the artifact there; the coordinator then renames it into
    /// place. Concurrent callers for the same object id block until the first
    /// one finishes and then observe the completed entry.
    ///
    /// On staging failure the temp path is discarded and the lock released,
    /// so a later retry is not blocked and no partial entry becomes visible.
    pub async fn fetch<F, Fut>(
        &self,
        object_id: &RemoteObjectId,
        final_path: &Path,
        stage: F,
    ) -> Result<PathBuf, DatastoreError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<(), DatastoreError>>,
    {
        // Fast path: completed entries are immutable, so existence alone
        // means the artifact is valid. No lock, no network.
        if final_path.exists() {
            return Ok(final_path.to_path_buf());
        }

        let lock: Arc<Mutex<()>> = self
            .locks
            .entry(object_id.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result: Result<PathBuf, DatastoreError> = {
            let _guard = lock.lock().await;
            self.fetch_locked(object_id, final_path, stage).await
        };

        // Drop the registry entry once nobody is waiting on it (the map and
        // this call hold one clone each).
        self.locks
            .remove_if(object_id.as_str(), |_, l| Arc::strong_count(l) <= 2);

        result
    }

    async fn fetch_locked<F, Fut>(
        &self,
        object_id: &RemoteObjectId,
        final_path: &Path,
        stage: F,
    ) -> Result<PathBuf, DatastoreError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<(), DatastoreError>>,
    {
        // Double-check under the lock: another caller may have finished the
        // download while this one was waiting to acquire.
        if final_path.exists() {
            debug!(object_id = %object_id, "download completed by concurrent caller");
            return Ok(final_path.to_path_buf());
        }

        if let Some(parent) = final_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let staging: PathBuf = staging_path(final_path);
        // Leftover staging output from a crashed run is stale, not reusable.
        discard(&staging);

        debug!(object_id = %object_id, staging = %staging.display(), "starting download");
        if let Err(e) = stage(staging.clone()).await {
            discard(&staging);
            return Err(e);
        }

        match std::fs::rename(&staging, final_path) {
            Ok(()) => {
                info!(object_id = %object_id, path = %final_path.display(), "cached artifact");
                Ok(final_path.to_path_buf())
            }
            Err(_) if final_path.exists() => {
                // Another process renamed its own copy into place first. The
                // entry is immutable and byte-identical, so keep theirs.
                warn!(object_id = %object_id, "lost cross-process publication race");
                discard(&staging);
                Ok(final_path.to_path_buf())
            }
            Err(e) => {
                discard(&staging);
                Err(DatastoreError::Io(e))
            }
        }
    }

    /// Number of keys currently tracked in the lock registry.
    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

/// Staging path next to `final_path`, unique per process so two processes
/// sharing one cache root never collide on the temp name.
fn staging_path(final_path: &Path) -> PathBuf {
    let name: String = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!("{}.{}.part", name, std::process::id()))
}

/// Best-effort removal of a staging file or directory.
fn discard(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    if let Err(e) = result {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to discard staging path");
        }
    }
}
