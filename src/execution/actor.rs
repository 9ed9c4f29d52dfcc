//! # Execution Actor
//!
//! The "server" half of the execution module. It owns the receiver end of the
//! request channel and applies commands to storage one at a time, so command
//! ordering and the applied counter need no lock of their own.

use super::message::{Command, ExecutionRequest};
use super::{ExecutionError, APPLIED_KEY, RESERVED_PREFIX};
use crate::config::ExecutionConfig;
use crate::storage::Storage;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Validation limits taken from [`ExecutionConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_key_len: usize,
    pub max_value_len: usize,
}

impl From<&ExecutionConfig> for Limits {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            max_key_len: config.max_key_len,
            max_value_len: config.max_value_len,
        }
    }
}

impl Limits {
    /// Checks a user-supplied key.
    pub fn check_key(&self, key: &str) -> Result<(), ExecutionError> {
        if key.is_empty() {
            return Err(ExecutionError::InvalidKey("empty key".into()));
        }
        if key.starts_with(RESERVED_PREFIX) {
            return Err(ExecutionError::ReservedKey(key.to_string()));
        }
        if key.len() > self.max_key_len {
            return Err(ExecutionError::InvalidKey(format!(
                "{} bytes exceeds limit of {}",
                key.len(),
                self.max_key_len
            )));
        }
        Ok(())
    }

    /// Longest request line a client may send: key and value with every byte
    /// escaped as `\uXXXX`, plus room for the envelope.
    pub fn max_request_len(&self) -> usize {
        self.max_key_len
            .saturating_add(self.max_value_len)
            .saturating_mul(6)
            .saturating_add(256)
    }

    pub fn check_command(&self, command: &Command) -> Result<(), ExecutionError> {
        self.check_key(command.key())?;
        if let Command::Put { value, .. } = command {
            if value.len() > self.max_value_len {
                return Err(ExecutionError::ValueTooLarge {
                    len: value.len(),
                    max: self.max_value_len,
                });
            }
        }
        Ok(())
    }
}

pub struct ExecutionActor {
    receiver: mpsc::Receiver<ExecutionRequest>,
    storage: Storage,
    limits: Limits,
    applied: u64,
}

impl ExecutionActor {
    pub fn new(
        receiver: mpsc::Receiver<ExecutionRequest>,
        storage: Storage,
        limits: Limits,
        applied: u64,
    ) -> Self {
        Self {
            receiver,
            storage,
            limits,
            applied,
        }
    }

    /// Processes requests until [`ExecutionRequest::Stop`] arrives or every
    /// client has been dropped.
    pub async fn run(mut self) {
        info!(applied = self.applied, "Execution actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ExecutionRequest::Apply {
                    command,
                    respond_to,
                } => {
                    debug!(?command, "Apply");
                    let result = self.apply(command);
                    if let Err(e) = &result {
                        warn!(error = %e, "Apply failed");
                    }
                    let _ = respond_to.send(result);
                }
                ExecutionRequest::Query { key, respond_to } => {
                    let result = self
                        .limits
                        .check_key(&key)
                        .and_then(|()| Ok(self.storage.get_opt(&key)?));
                    debug!(%key, found = matches!(result, Ok(Some(_))), "Query");
                    let _ = respond_to.send(result);
                }
                ExecutionRequest::Applied { respond_to } => {
                    let _ = respond_to.send(Ok(self.applied));
                }
                ExecutionRequest::Stop => {
                    debug!("Stop requested");
                    break;
                }
            }
        }

        info!(applied = self.applied, "Execution actor stopped");
    }

    fn apply(&mut self, command: Command) -> Result<u64, ExecutionError> {
        self.limits.check_command(&command)?;

        let next = self.applied + 1;
        match command {
            Command::Put { key, value } => self.storage.set(key, value)?,
            Command::Delete { key } => {
                self.storage.delete(&key)?;
            }
        }
        self.storage.set(APPLIED_KEY, next.to_string())?;
        self.applied = next;

        info!(sequence = next, "Applied");
        Ok(next)
    }
}
