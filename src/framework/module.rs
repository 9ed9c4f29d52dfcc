//! # Module Contracts
//!
//! The supervisor only sees modules through these two traits.
//!
//! - [`Service`]: a module with its own run loop (the transport). It is started
//!   once and stopped once.
//! - [`Resource`]: a module holding something that must be released during
//!   teardown (storage files, an actor task).
//!
//! Both stop methods take `self` by value (boxed), so a handle cannot be torn
//! down twice.

use crate::framework::BoxError;
use async_trait::async_trait;

/// A long-lived module with its own concurrent run loop.
#[async_trait]
pub trait Service: Send + 'static {
    /// Short name used in log fields and fault reports.
    fn name(&self) -> &'static str;

    /// Starts serving on a separate task and returns immediately.
    ///
    /// If the run loop later terminates abnormally it must report exactly one
    /// [`Fault`](crate::framework::Fault) through the sender it was constructed with.
    fn start(&mut self);

    /// Stops the module and waits until its tasks have exited.
    async fn shutdown(self: Box<Self>) -> Result<(), BoxError>;
}

/// A module whose resources are released during teardown.
#[async_trait]
pub trait Resource: Send + 'static {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Releases everything this handle owns. Called at most once.
    async fn release(self: Box<Self>) -> Result<(), BoxError>;
}
