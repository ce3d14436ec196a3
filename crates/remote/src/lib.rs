//! Remote object store adapter for the versioned datastore.
//!
//! This crate defines the [`RemoteStore`] trait, the capability boundary toward
//! the durable backend. Implementations handle the actual storage (a cloud
//! object store, a shared filesystem, memory for tests) while the datastore
//! layer above translates artifact coordinates into object ids.
//!
//! The adapter is deliberately thin: no retries, no caching, no coherence
//! logic. Failures propagate verbatim to the caller so the layers above can
//! decide how to surface them.

mod error;
mod fs;
mod memory;

pub use error::RemoteStoreError;
pub use fs::FsRemoteStore;
pub use memory::MemoryRemoteStore;

use std::path::Path;

use async_trait::async_trait;

/// Low-level remote object operations - implemented by each backend.
///
/// Object ids are opaque strings here; the datastore layer derives them from
/// artifact coordinates. Backends must support streaming transfers through the
/// `*_file` variants so large artifacts never require whole-object buffering.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload bytes under an object id, replacing any existing object.
    async fn put_bytes(&self, object_id: &str, data: &[u8]) -> Result<(), RemoteStoreError>;

    /// Upload a local file under an object id (streaming, for large objects).
    async fn put_from_file(&self, object_id: &str, path: &Path) -> Result<(), RemoteStoreError>;

    /// Download an object into memory.
    ///
    /// # Returns
    /// The object bytes, or `RemoteStoreError::NotFound` if absent.
    async fn get_bytes(&self, object_id: &str) -> Result<Vec<u8>, RemoteStoreError>;

    /// Download an object to a local file path (streaming, for large objects).
    ///
    /// The parent directory of `path` must already exist.
    async fn get_to_file(&self, object_id: &str, path: &Path) -> Result<(), RemoteStoreError>;

    /// Check whether an object exists.
    async fn exists(&self, object_id: &str) -> Result<bool, RemoteStoreError>;

    /// List object ids starting with a prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteStoreError>;

    /// Delete an object. Deleting an absent object is not an error.
    async fn delete(&self, object_id: &str) -> Result<(), RemoteStoreError>;
}
