use crate::config::AppConfig;
use crate::execution::{Execution, ExecutionError};
use crate::framework::{FaultReceiver, FaultSender, PhaseTracker, Supervisor};
use crate::network::{Network, NetworkError};
use crate::storage::{Storage, StorageError};
use thiserror::Error;
use tracing::info;

/// A module failed to construct. Nothing has been started yet.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("storage construction failed: {0}")]
    Storage(#[from] StorageError),

    #[error("execution construction failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("network construction failed: {0}")]
    Network(#[from] NetworkError),
}

impl InitError {
    /// Name of the module whose construction failed.
    pub fn module(&self) -> &'static str {
        match self {
            InitError::Storage(_) => "storage",
            InitError::Execution(_) => "execution",
            InitError::Network(_) => "network",
        }
    }
}

/// Every module of a gram node, constructed and wired but not started.
///
/// # Dependencies
///
/// ```text
/// storage ◄── execution ◄── network
///    ▲                         │
///    └─────────────────────────┘
/// ```
///
/// The constructors take their dependencies as arguments, so the construction
/// order is enforced by the types: execution cannot be built without a storage
/// handle, and the network needs both.
///
/// # Example
///
/// ```ignore
/// let (faults, receiver) = fault::channel();
/// let node = Node::bootstrap(&config, faults.clone()).await?;
/// let outcome = node
///     .into_supervisor(phase, (faults, receiver))
///     .run(signal::wait_for_shutdown_signal())
///     .await;
/// ```
pub struct Node {
    pub storage: Storage,
    pub execution: Execution,
    pub network: Network,
}

impl Node {
    /// Runs the construction chain: storage, then execution, then network.
    ///
    /// Stops at the first failure. Modules built before it are dropped without
    /// being started or shut down.
    pub async fn bootstrap(config: &AppConfig, faults: FaultSender) -> Result<Self, InitError> {
        let storage = Storage::open(&config.storage).await?;
        info!(module = "storage", "Module constructed");

        let execution = Execution::new(storage.clone(), &config.execution)?;
        info!(module = "execution", "Module constructed");

        let network =
            Network::new(faults, execution.client(), storage.clone(), &config.network).await?;
        info!(module = "network", "Module constructed");

        Ok(Self {
            storage,
            execution,
            network,
        })
    }

    /// Hands every handle to a [`Supervisor`].
    ///
    /// Release order is the reverse of construction: execution before storage.
    pub fn into_supervisor(
        self,
        phase: PhaseTracker,
        faults: (FaultSender, FaultReceiver),
    ) -> Supervisor {
        Supervisor::new(
            phase,
            faults,
            Box::new(self.network),
            vec![Box::new(self.execution), Box::new(self.storage)],
        )
    }
}
