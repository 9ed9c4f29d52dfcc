//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while opening, using or closing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage path is not usable.
    #[error("Storage path {} is invalid: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Reading or writing the snapshot failed.
    #[error("Storage I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot on disk could not be decoded.
    #[error("Storage snapshot {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot could not be encoded.
    #[error("Storage snapshot could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    /// A required key is missing.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The handle was used after `close`.
    #[error("Storage is closed")]
    Closed,
}
