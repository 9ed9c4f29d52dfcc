//! # Supervisor Loop
//!
//! The supervisor owns every module handle once construction has finished. Its
//! run is three steps:
//!
//! ```text
//! start service ──┐
//! spawn listener ─┴─► recv() on the fault channel (the only wait)
//!                           │
//!                           ▼
//!                  shutdown::sequence(service, resources)
//! ```
//!
//! Shutdown logic never looks at where the fault came from. A module crash and
//! a Ctrl-C take the same path.

use crate::framework::shutdown::{self, TeardownError};
use crate::framework::{signal, Fault, FaultReceiver, FaultSender, Phase, PhaseTracker};
use crate::framework::{Resource, Service};
use std::future::Future;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// What ended the run, and what went wrong while tearing down.
#[derive(Debug)]
pub struct Outcome {
    /// The first fault received. Later faults were dropped.
    pub fault: Fault,
    /// Errors logged during teardown, in the order they happened.
    pub teardown_errors: Vec<TeardownError>,
}

impl Outcome {
    /// `true` when shutdown was requested from outside and teardown was clean.
    pub fn is_clean(&self) -> bool {
        self.fault.is_external() && self.teardown_errors.is_empty()
    }
}

/// Runs the constructed modules until the first fault, then tears them down.
pub struct Supervisor {
    phase: PhaseTracker,
    faults: FaultReceiver,
    listener_faults: FaultSender,
    service: Box<dyn Service>,
    resources: Vec<Box<dyn Resource>>,
}

impl Supervisor {
    /// Takes ownership of the modules.
    ///
    /// `resources` must already be in release order: dependents before their
    /// dependencies.
    pub fn new(
        phase: PhaseTracker,
        faults: (FaultSender, FaultReceiver),
        service: Box<dyn Service>,
        resources: Vec<Box<dyn Resource>>,
    ) -> Self {
        let (listener_faults, faults) = faults;
        Self {
            phase,
            faults,
            listener_faults,
            service,
            resources,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Starts the service and the signal listener, waits for the first fault,
    /// then runs the shutdown sequence.
    pub async fn run<F>(self, signal: F) -> Outcome
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let Supervisor {
            phase,
            faults,
            listener_faults,
            mut service,
            resources,
        } = self;

        service.start();
        let listener = tokio::spawn(signal::listen(signal, listener_faults));
        phase.advance(Phase::Running);
        info!(service = service.name(), "Supervisor running");

        let fault = faults.recv().await;
        if fault.is_external() {
            info!(%fault, "Shutdown requested");
        } else {
            error!(%fault, "Fault received, shutting down");
        }
        phase.advance(Phase::ShuttingDown);
        listener.abort();

        let teardown_errors = shutdown::sequence(service, resources).await;
        if !teardown_errors.is_empty() {
            warn!(errors = teardown_errors.len(), "Teardown finished with errors");
        }
        phase.advance(Phase::Terminated);

        Outcome {
            fault,
            teardown_errors,
        }
    }
}
