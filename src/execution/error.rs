//! Error types for the execution module.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while constructing or talking to the execution actor.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The execution section of the config cannot be used.
    #[error("Invalid execution config: {0}")]
    InvalidConfig(String),

    /// State persisted by a previous run could not be decoded.
    #[error("Corrupt execution state under {key}: {value:?}")]
    CorruptState { key: &'static str, value: String },

    /// The key is empty or longer than the configured limit.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The key uses the prefix reserved for internal state.
    #[error("Key {0:?} is reserved")]
    ReservedKey(String),

    #[error("Value of {len} bytes exceeds limit of {max}")]
    ValueTooLarge { len: usize, max: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Execution actor closed")]
    ActorClosed,

    #[error("Execution actor dropped response channel")]
    ActorDropped,

    #[error("Execution actor panicked: {0}")]
    ActorPanicked(#[from] tokio::task::JoinError),
}
