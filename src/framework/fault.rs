//! # Fault Channel
//!
//! Every concurrently running producer (the transport module, the signal
//! listener) shares one [`FaultSender`]. The supervisor owns the single
//! [`FaultReceiver`] and consumes exactly one [`Fault`] from it.
//!
//! The channel has one slot. [`FaultSender::report`] never waits: the first
//! fault fills the slot, every later report finds it full (or the receiver
//! already gone) and is dropped. This gives "first writer wins" without any
//! lock at this layer.

use crate::framework::BoxError;
use tokio::sync::mpsc;
use tracing::debug;

/// The single value type flowing over the fault channel.
///
/// The shutdown path does not care which variant arrived, only that one did.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// An external termination request (SIGINT, SIGTERM, Ctrl-C) was received.
    #[error("termination requested")]
    Interrupted,

    /// The signal listener could not register its handlers.
    #[error("signal listener failed: {0}")]
    SignalListener(#[source] std::io::Error),

    /// A supervised module reported a fatal condition.
    #[error("module `{module}` failed: {source}")]
    Module {
        module: &'static str,
        #[source]
        source: BoxError,
    },

    /// Every producer went away without reporting anything.
    #[error("all fault producers exited without reporting")]
    Orphaned,
}

impl Fault {
    /// Wraps a module error into a [`Fault::Module`].
    pub fn module<E>(module: &'static str, error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Fault::Module {
            module,
            source: error.into(),
        }
    }

    /// `true` when the fault came from outside the process rather than from a module.
    pub fn is_external(&self) -> bool {
        matches!(self, Fault::Interrupted)
    }
}

/// Creates the fault channel.
pub fn channel() -> (FaultSender, FaultReceiver) {
    let (sender, receiver) = mpsc::channel(1);
    (FaultSender { sender }, FaultReceiver { receiver })
}

/// Producer half of the fault channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct FaultSender {
    sender: mpsc::Sender<Fault>,
}

impl FaultSender {
    /// Reports a fault without waiting.
    ///
    /// Returns `true` if this fault took the slot. A `false` return means another
    /// fault already won (or the supervisor is gone) and this one was dropped.
    pub fn report(&self, fault: Fault) -> bool {
        match self.sender.try_send(fault) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(fault))
            | Err(mpsc::error::TrySendError::Closed(fault)) => {
                debug!(%fault, "Fault dropped, shutdown already triggered");
                false
            }
        }
    }

    /// `true` once the supervisor has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer half of the fault channel, owned by the supervisor.
#[derive(Debug)]
pub struct FaultReceiver {
    receiver: mpsc::Receiver<Fault>,
}

impl FaultReceiver {
    /// Suspends until the first fault arrives.
    ///
    /// Consumes the receiver: once it returns, the channel is closed and every
    /// later report is a no-op.
    pub async fn recv(mut self) -> Fault {
        self.receiver.recv().await.unwrap_or(Fault::Orphaned)
    }
}
