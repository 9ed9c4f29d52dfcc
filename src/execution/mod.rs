//! # Execution (processing module)
//!
//! Validates commands and applies them to [`Storage`]. Constructed second,
//! after storage and before the network.
//!
//! Unlike storage, execution runs its own task (the [`ExecutionActor`]). That
//! task is a releasable resource: during teardown the supervisor sends it a
//! stop request and joins it, after the network has stopped and before
//! storage is closed.

pub mod actor;
pub mod client;
pub mod error;
pub mod message;

pub use actor::{ExecutionActor, Limits};
pub use client::ExecutionClient;
pub use error::*;
pub use message::{Command, ExecutionRequest};

use crate::config::ExecutionConfig;
use crate::framework::{BoxError, Resource};
use crate::storage::Storage;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Keys starting with this prefix hold internal state and are not writable by clients.
pub const RESERVED_PREFIX: &str = "__";

/// Number of commands applied so far.
pub const APPLIED_KEY: &str = "__execution/applied";

/// Handle to the running execution actor, owned by the supervisor.
pub struct Execution {
    client: ExecutionClient,
    task: JoinHandle<()>,
}

impl Execution {
    /// Validates `config`, restores the applied counter from `storage` and
    /// spawns the actor.
    pub fn new(storage: Storage, config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        if config.queue_capacity == 0 {
            return Err(ExecutionError::InvalidConfig(
                "queue_capacity must be > 0".into(),
            ));
        }
        if config.max_key_len == 0 || config.max_value_len == 0 {
            return Err(ExecutionError::InvalidConfig("limits must be > 0".into()));
        }

        let applied = match storage.get_opt(APPLIED_KEY)? {
            Some(raw) => raw.parse().map_err(|_| ExecutionError::CorruptState {
                key: APPLIED_KEY,
                value: raw,
            })?,
            None => 0,
        };

        let limits = Limits::from(config);
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let actor = ExecutionActor::new(receiver, storage, limits, applied);
        let task = tokio::spawn(actor.run());
        info!(applied, "Execution constructed");

        Ok(Self {
            client: ExecutionClient::new(sender, limits),
            task,
        })
    }

    /// A client for a dependent module.
    pub fn client(&self) -> ExecutionClient {
        self.client.clone()
    }

    /// Stops the actor and waits for its task.
    pub async fn release(self) -> Result<(), ExecutionError> {
        self.client.stop().await;
        drop(self.client);
        self.task.await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for Execution {
    fn name(&self) -> &'static str {
        "execution"
    }

    async fn release(self: Box<Self>) -> Result<(), BoxError> {
        Execution::release(*self).await.map_err(Into::into)
    }
}
