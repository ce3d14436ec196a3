//! Error types for remote store operations.

use thiserror::Error;

/// Errors from remote store operations.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// The requested object does not exist in the remote store.
    #[error("object not found: {object_id}")]
    NotFound {
        /// Object id that was requested.
        object_id: String,
    },

    /// A transfer to or from the backend failed.
    #[error("transfer failed for {object_id}: {message}")]
    Transfer {
        /// Object id being transferred.
        object_id: String,
        /// Backend-reported failure detail.
        message: String,
    },

    /// Backend configuration is invalid.
    #[error("invalid remote store config: {message}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Local IO error while staging a transfer.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
