//! Messages exchanged between [`ExecutionClient`](super::ExecutionClient) and the actor.

use super::ExecutionError;
use tokio::sync::oneshot;

/// One-shot reply channel used by the actor.
pub type Response<T> = oneshot::Sender<Result<T, ExecutionError>>;

/// A state change submitted for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put { key: String, value: String },
    Delete { key: String },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Put { key, .. } | Command::Delete { key } => key,
        }
    }
}

/// Requests processed sequentially by the execution actor.
#[derive(Debug)]
pub enum ExecutionRequest {
    /// Apply a command; replies with the sequence number it was applied at.
    Apply {
        command: Command,
        respond_to: Response<u64>,
    },
    /// Read the current value of a key.
    Query {
        key: String,
        respond_to: Response<Option<String>>,
    },
    /// Number of commands applied so far, across restarts.
    Applied { respond_to: Response<u64> },
    /// Leave the loop even if clients are still alive.
    Stop,
}
