//! # Shutdown Sequencer
//!
//! Teardown runs once, in reverse dependency order:
//!
//! 1. stop the service (blocks until its tasks have exited)
//! 2. release each resource in the order given
//! 3. log the final line
//!
//! Every step runs even if an earlier one failed. Errors are logged and
//! collected, never retried and never propagated as a new fault.

use crate::framework::{BoxError, Resource, Service};
use tracing::{error, info};

/// A failure observed while tearing a module down.
#[derive(Debug, thiserror::Error)]
#[error("teardown of `{module}` failed: {source}")]
pub struct TeardownError {
    pub module: &'static str,
    #[source]
    pub source: BoxError,
}

/// Runs the teardown steps and returns every error encountered.
pub async fn sequence(
    service: Box<dyn Service>,
    resources: Vec<Box<dyn Resource>>,
) -> Vec<TeardownError> {
    let mut errors = Vec::new();

    let module = service.name();
    info!(module, "Stopping service");
    match service.shutdown().await {
        Ok(()) => info!(module, "Service stopped"),
        Err(source) => {
            error!(module, error = %source, "Service shutdown failed");
            errors.push(TeardownError { module, source });
        }
    }

    for resource in resources {
        let module = resource.name();
        info!(module, "Releasing resource");
        match resource.release().await {
            Ok(()) => info!(module, "Resource released"),
            Err(source) => {
                error!(module, error = %source, "Resource release failed");
                errors.push(TeardownError { module, source });
            }
        }
    }

    info!(errors = errors.len(), "Shutdown complete");
    errors
}
