//! Versioned, content-addressed artifact store with a coherent local cache.
//!
//! Clients publish immutable files or directory trees under a
//! (group, name, version) key and later resolve that key, from any process
//! on any machine, to a local filesystem path. The remote backend (behind
//! the [`RemoteStore`] trait from `versioned-datastore-remote`) is hit only
//! on first access; after that, existence of the cache entry is the sole and
//! sufficient coherence signal, because artifacts are immutable per version.
//!
//! The pieces, leaves first:
//! - [`key`] - artifact coordinates and remote object id derivation
//! - [`cache`] - the local cache layout mirroring remote naming
//! - [`coordinator`] - at most one in-flight download per object id
//! - [`archive`] - directory tree packing into single archive objects
//! - [`Datastore`] - the publish/fetch facade composing the above
//! - [`url`] - the `datastore://` scheme and its stream-opening resolver

pub mod archive;
pub mod cache;
pub mod coordinator;
mod datastore;
mod error;
pub mod key;
pub mod url;

pub use cache::CacheOptions;
pub use datastore::Datastore;
pub use error::DatastoreError;
pub use key::{ArtifactKey, ArtifactKind, RemoteObjectId, StoreId};
pub use url::{ByteStream, DatastoreUrl, UrlResolver};

pub use versioned_datastore_remote::{
    FsRemoteStore, MemoryRemoteStore, RemoteStore, RemoteStoreError,
};
