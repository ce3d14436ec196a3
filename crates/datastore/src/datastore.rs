//! The datastore facade.
//!
//! Composes the remote store adapter, cache layout, download coordinator and
//! directory packer into the public publish/fetch operations. All fetches go
//! through the coordinator, so any number of concurrent callers for one key
//! cost exactly one remote transfer; publishes go straight to the remote and
//! never touch the local cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use versioned_datastore_remote::{RemoteStore, RemoteStoreError};

use crate::archive;
use crate::cache::{CacheLayout, CacheOptions};
use crate::coordinator::DownloadCoordinator;
use crate::error::DatastoreError;
use crate::key::{ArtifactKey, ArtifactKind, RemoteObjectId, StoreId};

/// One logical datastore: a remote namespace plus its local cache.
///
/// Cheap to share behind an `Arc`; all operations take `&self`.
pub struct Datastore {
    store: StoreId,
    remote: Arc<dyn RemoteStore>,
    layout: CacheLayout,
    coordinator: DownloadCoordinator,
}

impl Datastore {
    /// Create a datastore over a remote backend.
    pub fn new(store: StoreId, remote: Arc<dyn RemoteStore>, options: CacheOptions) -> Self {
        let layout: CacheLayout = CacheLayout::new(options, store.clone());
        Self {
            store,
            remote,
            layout,
            coordinator: DownloadCoordinator::new(),
        }
    }

    /// The store identity.
    pub fn store_id(&self) -> &StoreId {
        &self.store
    }

    /// Root directory of this store's local cache entries.
    pub fn cache_root(&self) -> PathBuf {
        self.layout.store_root()
    }

    /// Publish a local file under (group, name, version).
    ///
    /// Publishing onto an existing key is a hard [`DatastoreError::AlreadyExists`]
    /// unless `overwrite` is set; artifacts are immutable per version.
    pub async fn publish_file(
        &self,
        local: &Path,
        group: &str,
        name: &str,
        version: u32,
        overwrite: bool,
    ) -> Result<(), DatastoreError> {
        let key: ArtifactKey = checked_key(group, name, version, ArtifactKind::File)?;
        let object_id: RemoteObjectId = key.object_id();
        self.check_overwrite(&key, &object_id, overwrite).await?;

        self.remote
            .put_from_file(object_id.as_str(), local)
            .await
            .map_err(DatastoreError::Transfer)?;
        info!(store = %self.store, key = %key, "published file");
        Ok(())
    }

    /// Publish a local directory tree under (group, name, version).
    ///
    /// The tree is packed into a single archive object; same overwrite policy
    /// as [`publish_file`](Self::publish_file).
    pub async fn publish_directory(
        &self,
        local_dir: &Path,
        group: &str,
        name: &str,
        version: u32,
        overwrite: bool,
    ) -> Result<(), DatastoreError> {
        let key: ArtifactKey = checked_key(group, name, version, ArtifactKind::Directory)?;
        let object_id: RemoteObjectId = key.object_id();
        self.check_overwrite(&key, &object_id, overwrite).await?;

        let bytes: Vec<u8> = archive::pack_directory(local_dir).await?;
        self.remote
            .put_bytes(object_id.as_str(), &bytes)
            .await
            .map_err(DatastoreError::Transfer)?;
        info!(store = %self.store, key = %key, bytes = bytes.len(), "published directory");
        Ok(())
    }

    /// Resolve a published file to a local path, downloading on first access.
    ///
    /// Fails with [`DatastoreError::DoesNotExist`] carrying the exact queried
    /// coordinates when no such (group, name, version) was published.
    pub async fn file_path(
        &self,
        group: &str,
        name: &str,
        version: u32,
    ) -> Result<PathBuf, DatastoreError> {
        let key: ArtifactKey = checked_key(group, name, version, ArtifactKind::File)?;
        let object_id: RemoteObjectId = key.object_id();
        let entry: PathBuf = self.layout.entry_path(&object_id);

        let remote: Arc<dyn RemoteStore> = Arc::clone(&self.remote);
        let id: RemoteObjectId = object_id.clone();
        let stage_key: ArtifactKey = key.clone();
        self.coordinator
            .fetch(&object_id, &entry, move |staging| async move {
                remote
                    .get_to_file(id.as_str(), &staging)
                    .await
                    .map_err(|e| map_remote_error(&stage_key, e))
            })
            .await
    }

    /// Resolve a published directory to a local directory root, downloading
    /// and unpacking on first access.
    ///
    /// The unpack happens in the coordinator's staging directory, so a
    /// concurrently observing reader never sees a partially extracted tree.
    pub async fn directory_path(
        &self,
        group: &str,
        name: &str,
        version: u32,
    ) -> Result<PathBuf, DatastoreError> {
        let key: ArtifactKey = checked_key(group, name, version, ArtifactKind::Directory)?;
        let object_id: RemoteObjectId = key.object_id();
        let entry: PathBuf = self.layout.entry_path(&object_id);

        let remote: Arc<dyn RemoteStore> = Arc::clone(&self.remote);
        let id: RemoteObjectId = object_id.clone();
        let stage_key: ArtifactKey = key.clone();
        self.coordinator
            .fetch(&object_id, &entry, move |staging| async move {
                let bytes: Vec<u8> = remote
                    .get_bytes(id.as_str())
                    .await
                    .map_err(|e| map_remote_error(&stage_key, e))?;
                std::fs::create_dir_all(&staging)?;
                archive::unpack_archive(bytes, &staging, id.as_str()).await
            })
            .await
    }

    /// List the published versions of a (group, name) coordinate.
    pub async fn versions(
        &self,
        group: &str,
        name: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<u32>, DatastoreError> {
        let key: ArtifactKey = checked_key(group, name, 0, kind)?;
        let prefix: String = key.version_prefix();
        let object_ids: Vec<String> = self
            .remote
            .list(&prefix)
            .await
            .map_err(DatastoreError::Transfer)?;

        let mut versions: Vec<u32> = object_ids
            .iter()
            .filter_map(|id| id.strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse().ok())
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Delete every local cache entry of this store. The remote is untouched;
    /// subsequent fetches re-download.
    pub fn wipe_cache(&self) -> Result<(), DatastoreError> {
        info!(store = %self.store, "wiping local cache");
        self.layout.wipe()
    }

    async fn check_overwrite(
        &self,
        key: &ArtifactKey,
        object_id: &RemoteObjectId,
        overwrite: bool,
    ) -> Result<(), DatastoreError> {
        if overwrite {
            return Ok(());
        }
        let exists: bool = self
            .remote
            .exists(object_id.as_str())
            .await
            .map_err(DatastoreError::Transfer)?;
        if exists {
            return Err(DatastoreError::AlreadyExists {
                group: key.group.clone(),
                name: key.name.clone(),
                version: key.version,
                kind: key.kind,
            });
        }
        Ok(())
    }
}

/// Build a key after checking that group and name are safe to embed in an
/// object id, so distinct coordinates can never alias one remote object or
/// cache path.
fn checked_key(
    group: &str,
    name: &str,
    version: u32,
    kind: ArtifactKind,
) -> Result<ArtifactKey, DatastoreError> {
    for (field, value) in [("group", group), ("name", name)] {
        if !crate::key::is_valid_coordinate(value) {
            return Err(DatastoreError::InvalidCoordinate {
                field,
                value: value.to_string(),
            });
        }
    }
    Ok(ArtifactKey {
        group: group.to_string(),
        name: name.to_string(),
        version,
        kind,
    })
}

/// Map a remote error for a known queried key.
///
/// `NotFound` becomes `DoesNotExist` with the exact coordinates; everything
/// else stays a transfer failure.
fn map_remote_error(key: &ArtifactKey, error: RemoteStoreError) -> DatastoreError {
    match error {
        RemoteStoreError::NotFound { .. } => DatastoreError::DoesNotExist {
            group: key.group.clone(),
            name: key.name.clone(),
            version: key.version,
            kind: key.kind,
        },
        other => DatastoreError::Transfer(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use versioned_datastore_remote::MemoryRemoteStore;

    fn create_datastore() -> (Datastore, Arc<MemoryRemoteStore>, TempDir) {
        let cache: TempDir = TempDir::new().unwrap();
        let remote: Arc<MemoryRemoteStore> = Arc::new(MemoryRemoteStore::new());
        let datastore: Datastore = Datastore::new(
            StoreId::new("test"),
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            CacheOptions::with_root(cache.path()),
        );
        (datastore, remote, cache)
    }

    #[tokio::test]
    async fn test_republish_without_overwrite_fails() {
        let (datastore, _remote, _cache) = create_datastore();
        let src: TempDir = TempDir::new().unwrap();
        let file: PathBuf = src.path().join("a.bin");
        std::fs::write(&file, b"v7").unwrap();

        datastore
            .publish_file(&file, "g", "a.bin", 7, false)
            .await
            .unwrap();

        let err = datastore
            .publish_file(&file, "g", "a.bin", 7, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatastoreError::AlreadyExists { version: 7, .. }
        ));
    }

    #[tokio::test]
    async fn test_republish_with_overwrite_replaces() {
        let (datastore, _remote, _cache) = create_datastore();
        let src: TempDir = TempDir::new().unwrap();
        let file: PathBuf = src.path().join("a.bin");

        std::fs::write(&file, b"first").unwrap();
        datastore
            .publish_file(&file, "g", "a.bin", 1, false)
            .await
            .unwrap();

        std::fs::write(&file, b"second").unwrap();
        datastore
            .publish_file(&file, "g", "a.bin", 1, true)
            .await
            .unwrap();

        let path: PathBuf = datastore.file_path("g", "a.bin", 1).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_rejects_coordinates_that_would_alias_object_ids() {
        let (datastore, remote, _cache) = create_datastore();
        let src: TempDir = TempDir::new().unwrap();
        let file: PathBuf = src.path().join("y");
        std::fs::write(&file, b"payload").unwrap();

        // ("g/x", "y") and ("g", "x/y") would both derive object id
        // "g/x/y-v1" if slashes were allowed through.
        let err: DatastoreError = datastore
            .publish_file(&file, "g/x", "y", 1, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatastoreError::InvalidCoordinate { field: "group", .. }
        ));
        let err: DatastoreError = datastore
            .publish_file(&file, "g", "x/y", 1, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatastoreError::InvalidCoordinate { field: "name", .. }
        ));
        assert_eq!(remote.uploads(), 0);

        let err: DatastoreError = datastore.file_path("g/x", "y", 1).await.unwrap_err();
        assert!(matches!(err, DatastoreError::InvalidCoordinate { .. }));
        let err: DatastoreError = datastore.directory_path("g", "..", 1).await.unwrap_err();
        assert!(matches!(err, DatastoreError::InvalidCoordinate { .. }));
        let err: DatastoreError = datastore
            .versions("", "y", ArtifactKind::File)
            .await
            .unwrap_err();
        assert!(matches!(err, DatastoreError::InvalidCoordinate { .. }));
        assert_eq!(remote.downloads(), 0);
    }

    #[tokio::test]
    async fn test_versions_listing() {
        let (datastore, _remote, _cache) = create_datastore();
        let src: TempDir = TempDir::new().unwrap();
        let file: PathBuf = src.path().join("a");
        std::fs::write(&file, b"x").unwrap();

        for version in [3, 1, 7] {
            datastore
                .publish_file(&file, "g", "a", version, false)
                .await
                .unwrap();
        }
        // Same name as a directory lives on a separate axis.
        datastore
            .publish_directory(src.path(), "g", "a", 5, false)
            .await
            .unwrap();

        let versions: Vec<u32> = datastore
            .versions("g", "a", ArtifactKind::File)
            .await
            .unwrap();
        assert_eq!(versions, vec![1, 3, 7]);

        let dir_versions: Vec<u32> = datastore
            .versions("g", "a", ArtifactKind::Directory)
            .await
            .unwrap();
        assert_eq!(dir_versions, vec![5]);
    }

    #[tokio::test]
    async fn test_wipe_cache_forces_redownload() {
        let (datastore, remote, _cache) = create_datastore();
        let src: TempDir = TempDir::new().unwrap();
        let file: PathBuf = src.path().join("a");
        std::fs::write(&file, b"x").unwrap();
        datastore
            .publish_file(&file, "g", "a", 1, false)
            .await
            .unwrap();

        datastore.file_path("g", "a", 1).await.unwrap();
        datastore.file_path("g", "a", 1).await.unwrap();
        assert_eq!(remote.downloads(), 1);

        datastore.wipe_cache().unwrap();
        datastore.file_path("g", "a", 1).await.unwrap();
        assert_eq!(remote.downloads(), 2);
    }
}
