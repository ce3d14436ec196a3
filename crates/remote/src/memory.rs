//! In-memory remote store for tests and examples.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{RemoteStore, RemoteStoreError};

/// In-memory [`RemoteStore`] backend.
///
/// Holds objects in a map and counts transfers, which lets tests assert how
/// many uploads/downloads actually hit the "network". An optional per-transfer
/// latency makes download races observable, and downloads can be switched to
/// fail to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    /// Stored objects by id.
    objects: Mutex<HashMap<String, Vec<u8>>>,
    /// Number of completed downloads (get operations).
    downloads: AtomicU64,
    /// Number of completed uploads (put operations).
    uploads: AtomicU64,
    /// Artificial latency applied to every transfer.
    latency: Option<Duration>,
    /// When set, all downloads fail with a transfer error.
    fail_downloads: AtomicBool,
}

impl MemoryRemoteStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that sleeps for `latency` on every transfer.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Number of downloads performed so far.
    pub fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Number of uploads performed so far.
    pub fn uploads(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Make every subsequent download fail (or succeed again when `false`).
    pub fn set_fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    async fn simulate_transfer(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn lookup(&self, object_id: &str) -> Result<Vec<u8>, RemoteStoreError> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Transfer {
                object_id: object_id.to_string(),
                message: "injected download failure".to_string(),
            });
        }
        let objects = self.objects.lock();
        objects
            .get(object_id)
            .cloned()
            .ok_or_else(|| RemoteStoreError::NotFound {
                object_id: object_id.to_string(),
            })
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn put_bytes(&self, object_id: &str, data: &[u8]) -> Result<(), RemoteStoreError> {
        self.simulate_transfer().await;
        self.objects
            .lock()
            .insert(object_id.to_string(), data.to_vec());
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn put_from_file(&self, object_id: &str, path: &Path) -> Result<(), RemoteStoreError> {
        let data: Vec<u8> = tokio::fs::read(path).await?;
        self.put_bytes(object_id, &data).await
    }

    async fn get_bytes(&self, object_id: &str) -> Result<Vec<u8>, RemoteStoreError> {
        self.simulate_transfer().await;
        let data: Vec<u8> = self.lookup(object_id)?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(data)
    }

    async fn get_to_file(&self, object_id: &str, path: &Path) -> Result<(), RemoteStoreError> {
        let data: Vec<u8> = self.get_bytes(object_id).await?;
        tokio::fs::write(path, &data).await?;
        Ok(())
    }

    async fn exists(&self, object_id: &str) -> Result<bool, RemoteStoreError> {
        Ok(self.objects.lock().contains_key(object_id))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteStoreError> {
        let objects = self.objects.lock();
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, object_id: &str) -> Result<(), RemoteStoreError> {
        self.objects.lock().remove(object_id);
        Ok(())
    }
}
