//! Error types for the network module.

use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The node identity could not be loaded or stored.
    #[error("Node identity unavailable: {0}")]
    Identity(#[from] StorageError),

    /// The stored node identity is not a valid UUID.
    #[error("Stored node id {0:?} is not a valid UUID")]
    InvalidIdentity(String),

    /// Accepting connections failed; the serve loop has stopped.
    #[error("Accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The serve loop panicked.
    #[error("Serve loop panicked: {0}")]
    Panicked(#[from] tokio::task::JoinError),
}
