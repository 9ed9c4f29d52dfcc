//! # Execution Client
//!
//! Cloneable, type-safe interface to the execution actor. Requests go over a
//! bounded mpsc channel; replies come back on a oneshot.

use super::message::{Command, ExecutionRequest};
use super::{ExecutionError, Limits};
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Debug)]
pub struct ExecutionClient {
    sender: mpsc::Sender<ExecutionRequest>,
    limits: Limits,
}

impl ExecutionClient {
    pub fn new(sender: mpsc::Sender<ExecutionRequest>, limits: Limits) -> Self {
        Self { sender, limits }
    }

    /// The limits the actor validates commands against.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Applies `command` and returns its sequence number.
    pub async fn apply(&self, command: Command) -> Result<u64, ExecutionError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ExecutionRequest::Apply {
                command,
                respond_to,
            })
            .await
            .map_err(|_| ExecutionError::ActorClosed)?;
        response.await.map_err(|_| ExecutionError::ActorDropped)?
    }

    pub async fn put(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<u64, ExecutionError> {
        self.apply(Command::Put {
            key: key.into(),
            value: value.into(),
        })
        .await
    }

    pub async fn delete(&self, key: impl Into<String>) -> Result<u64, ExecutionError> {
        self.apply(Command::Delete { key: key.into() }).await
    }

    pub async fn query(&self, key: impl Into<String>) -> Result<Option<String>, ExecutionError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ExecutionRequest::Query {
                key: key.into(),
                respond_to,
            })
            .await
            .map_err(|_| ExecutionError::ActorClosed)?;
        response.await.map_err(|_| ExecutionError::ActorDropped)?
    }

    pub async fn applied(&self) -> Result<u64, ExecutionError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ExecutionRequest::Applied { respond_to })
            .await
            .map_err(|_| ExecutionError::ActorClosed)?;
        response.await.map_err(|_| ExecutionError::ActorDropped)?
    }

    /// Asks the actor to leave its loop. A closed actor is not an error.
    pub(crate) async fn stop(&self) {
        let _ = self.sender.send(ExecutionRequest::Stop).await;
    }
}
