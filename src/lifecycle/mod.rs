//! Process lifecycle: load settings, construct the modules, supervise them,
//! exit with a status describing what happened.
//!
//! ```text
//! PreInit ─► Initializing ─► Running ─► ShuttingDown ─► Terminated
//!                 │                                         ▲
//!                 └──────────── construction failed ────────┘
//! ```
//!
//! A construction failure never reaches the supervisor: nothing was started,
//! so nothing is torn down. Once running, every fault takes the same path
//! through [`shutdown::sequence`](crate::framework::shutdown::sequence).
//!
//! # Exit status
//!
//! | [`Exit`]   | code | cause                                  |
//! |------------|------|----------------------------------------|
//! | `Stopped`  | 0    | external termination request           |
//! | `Fault`    | 1    | a running module reported a fault      |
//! | `Config`   | 2    | settings could not be loaded           |
//! | `Init`     | 3    | a module failed to construct           |

pub mod node;
pub mod tracing;

pub use node::{InitError, Node};
pub use tracing::setup_tracing;

use crate::config::{AppConfig, LogConfig};
use crate::framework::{fault, signal, Phase, PhaseTracker};
use ::tracing::{error, info, warn};
use std::future::Future;
use std::process::ExitCode;

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Stopped,
    Fault,
    Config,
    Init,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Exit::Stopped => 0,
            Exit::Fault => 1,
            Exit::Config => 2,
            Exit::Init => 3,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Entry point of the `gram` binary.
///
/// Reads (or creates) the config under `$GRAM_HOME`, installs tracing from its
/// `[log]` section and runs the node until a termination signal or a fault.
pub async fn run() -> Exit {
    let config = match AppConfig::init_or_read() {
        Ok(config) => config,
        Err(e) => {
            setup_tracing(&LogConfig::default());
            error!(error = %e, "Error loading gram config");
            eprintln!("gram: {e}");
            return Exit::Config;
        }
    };
    setup_tracing(&config.log);

    run_with(&config, signal::wait_for_shutdown_signal()).await
}

/// Runs a node from an already loaded config.
///
/// `signal` resolves when the process is asked to stop; the binary passes
/// [`signal::wait_for_shutdown_signal`].
pub async fn run_with<F>(config: &AppConfig, signal: F) -> Exit
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    run_tracked(config, PhaseTracker::new(), signal).await
}

/// Same as [`run_with`], reporting phase transitions on `phase`.
pub async fn run_tracked<F>(config: &AppConfig, phase: PhaseTracker, signal: F) -> Exit
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    phase.advance(Phase::Initializing);
    info!("Starting gram node");

    let (faults, receiver) = fault::channel();
    let node = match Node::bootstrap(config, faults.clone()).await {
        Ok(node) => node,
        Err(e) => {
            error!(module = e.module(), error = %e, "Error initializing gram");
            eprintln!("gram: {e}");
            phase.advance(Phase::Terminated);
            return Exit::Init;
        }
    };

    let outcome = node
        .into_supervisor(phase, (faults, receiver))
        .run(signal)
        .await;

    for e in &outcome.teardown_errors {
        warn!(module = e.module, error = %e, "Teardown step failed");
    }
    info!("Shutting down gram");

    if outcome.fault.is_external() {
        Exit::Stopped
    } else {
        eprintln!("gram: {}", outcome.fault);
        Exit::Fault
    }
}
