//! # External termination requests
//!
//! [`wait_for_shutdown_signal`] completes on the first termination signal.
//! [`listen`] turns that completion into a [`Fault`] on the fault channel.
//!
//! ## Unix
//! SIGINT, SIGTERM and SIGQUIT are handled, with [`tokio::signal::ctrl_c`] as a
//! fallback.
//!
//! ## Other platforms
//! Only [`tokio::signal::ctrl_c`] is awaited.

use crate::framework::{Fault, FaultSender};
use std::future::Future;
use tracing::{info, warn};

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Waits on `signal` and reports the outcome as a fault.
///
/// A registration failure is reported too: a node that cannot be stopped
/// cleanly should not keep running.
pub async fn listen<F>(signal: F, faults: FaultSender)
where
    F: Future<Output = std::io::Result<()>> + Send,
{
    let fault = match signal.await {
        Ok(()) => {
            info!("Termination signal received");
            Fault::Interrupted
        }
        Err(e) => {
            warn!(error = %e, "Signal listener failed");
            Fault::SignalListener(e)
        }
    };
    faults.report(fault);
}
