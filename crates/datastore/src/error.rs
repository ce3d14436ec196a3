//! Error types for datastore operations.

use thiserror::Error;
use versioned_datastore_remote::RemoteStoreError;

use crate::key::ArtifactKind;

/// Errors from datastore operations.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// No artifact is published under the queried coordinates.
    ///
    /// Carries the exact coordinates that were queried, so a miss on the
    /// version is distinguishable from a miss on the name or the group.
    #[error("artifact does not exist: {group}/{name} {kind} v{version}")]
    DoesNotExist {
        /// Queried group.
        group: String,
        /// Queried artifact name.
        name: String,
        /// Queried version.
        version: u32,
        /// Whether a file or a directory was queried.
        kind: ArtifactKind,
    },

    /// Publish without overwrite onto an already published key.
    #[error("artifact already exists: {group}/{name} {kind} v{version}")]
    AlreadyExists {
        /// Group of the existing artifact.
        group: String,
        /// Name of the existing artifact.
        name: String,
        /// Version of the existing artifact.
        version: u32,
        /// Kind of the existing artifact.
        kind: ArtifactKind,
    },

    /// A group or name that cannot be embedded in an object id.
    ///
    /// Coordinates containing `/` (or empty / path-segment values) would
    /// alias distinct keys onto one object id, so they are rejected up front.
    #[error("invalid artifact {field}: {value:?}")]
    InvalidCoordinate {
        /// Which coordinate was rejected ("group" or "name").
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A remote transfer failed. The cache is left untouched.
    #[error("remote transfer failed: {0}")]
    Transfer(RemoteStoreError),

    /// A directory archive failed to unpack.
    #[error("corrupt archive for {object_id}: {message}")]
    CorruptArchive {
        /// Object id of the archive.
        object_id: String,
        /// Unpack failure detail.
        message: String,
    },

    /// A datastore URL could not be parsed.
    #[error("invalid datastore url {url:?}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// What is wrong with it.
        message: String,
    },

    /// No datastore with the URL's store name is registered.
    #[error("no datastore registered for store {store:?}")]
    UnknownStore {
        /// Store name from the URL.
        store: String,
    },

    /// A directory URL's member path does not exist in the fetched directory.
    #[error("member path not found in directory artifact: {path}")]
    MemberNotFound {
        /// Relative member path from the URL.
        path: String,
    },

    /// Local IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
