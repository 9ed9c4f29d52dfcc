//! Generic supervision core.
//!
//! Nothing in here knows about storage, execution or networking. The concrete
//! node wiring lives in [`crate::lifecycle`].
//!
//! # Main Components
//!
//! - [`fault`] - The single-slot fault channel ([`Fault`], [`FaultSender`], [`FaultReceiver`])
//! - [`module`] - The [`Service`] and [`Resource`] contracts modules implement
//! - [`phase`] - Lifecycle [`Phase`] tracking
//! - [`signal`] - OS termination signals as faults
//! - [`supervisor`] - The [`Supervisor`] loop
//! - [`shutdown`] - The teardown sequence
//!
//! # Testing
//!
//! See [`mock`] for recording module stand-ins.

pub mod fault;
pub mod mock;
pub mod module;
pub mod phase;
pub mod shutdown;
pub mod signal;
pub mod supervisor;

pub use fault::{Fault, FaultReceiver, FaultSender};
pub use module::{Resource, Service};
pub use phase::{Phase, PhaseTracker};
pub use shutdown::TeardownError;
pub use supervisor::{Outcome, Supervisor};

/// Boxed error used at module seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
