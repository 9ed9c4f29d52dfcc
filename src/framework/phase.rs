//! Lifecycle phases of the supervisor.

use std::fmt;
use tokio::sync::watch;
use tracing::info;

/// Supervisor-level lifecycle phase.
///
/// ```text
/// PreInit → Initializing → Running → ShuttingDown → Terminated
///                  └───────────────────────────────────┘  (construction failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreInit,
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

impl Phase {
    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (PreInit, Initializing)
                | (Initializing, Running)
                | (Initializing, Terminated)
                | (Running, ShuttingDown)
                | (ShuttingDown, Terminated)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::PreInit => "pre-init",
            Phase::Initializing => "initializing",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting-down",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Publishes phase transitions to any number of observers.
#[derive(Debug)]
pub struct PhaseTracker {
    sender: watch::Sender<Phase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Phase::PreInit);
        Self { sender }
    }

    pub fn current(&self) -> Phase {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.sender.subscribe()
    }

    /// Moves to `next`. Returns `false` (and leaves the phase unchanged) for an
    /// edge that is not part of the lifecycle graph.
    pub fn advance(&self, next: Phase) -> bool {
        let mut moved = false;
        self.sender.send_if_modified(|phase| {
            if phase.can_transition_to(next) {
                info!(from = %phase, to = %next, "Phase transition");
                *phase = next;
                moved = true;
            }
            moved
        });
        moved
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
