//! # Mock Modules
//!
//! Recording stand-ins for [`Service`] and [`Resource`] so the supervisor can be
//! tested without opening files or sockets.
//!
//! Every mock writes `"<name>.<call>"` into a shared [`CallLog`], which makes
//! ordering assertions a one-liner:
//!
//! ```ignore
//! let log = CallLog::new();
//! let network = MockService::new("network", &log).crash_on_start(faults, "listener crashed");
//! let storage = MockResource::new("storage", &log).fail_release("disk full");
//! // ... run the supervisor ...
//! assert_eq!(log.calls(), vec!["network.start", "network.shutdown", "storage.release"]);
//! ```

use crate::framework::{BoxError, Fault, FaultSender, Resource, Service};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Shared, ordered record of module calls.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

/// A service whose run loop is a task parked until shutdown.
pub struct MockService {
    name: &'static str,
    log: CallLog,
    shutdown_error: Option<String>,
    crash: Option<(FaultSender, String)>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockService {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
            shutdown_error: None,
            crash: None,
            stop: None,
            task: None,
        }
    }

    /// Makes `shutdown` return an error after the run loop has stopped.
    pub fn fail_shutdown(mut self, reason: impl Into<String>) -> Self {
        self.shutdown_error = Some(reason.into());
        self
    }

    /// Makes the run loop report a module fault as soon as it starts.
    pub fn crash_on_start(mut self, faults: FaultSender, reason: impl Into<String>) -> Self {
        self.crash = Some((faults, reason.into()));
        self
    }
}

#[async_trait]
impl Service for MockService {
    fn name(&self) -> &'static str {
        self.name
    }

    fn start(&mut self) {
        self.log.record(format!("{}.start", self.name));
        let (stop_tx, stop_rx) = oneshot::channel();
        let crash = self.crash.take();
        let name = self.name;
        self.stop = Some(stop_tx);
        self.task = Some(tokio::spawn(async move {
            if let Some((faults, reason)) = crash {
                faults.report(Fault::module(name, reason));
            }
            let _ = stop_rx.await;
        }));
    }

    async fn shutdown(self: Box<Self>) -> Result<(), BoxError> {
        let MockService {
            name,
            log,
            shutdown_error,
            stop,
            task,
            ..
        } = *self;
        log.record(format!("{name}.shutdown"));
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
        if let Some(task) = task {
            task.await?;
        }
        match shutdown_error {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }
}

/// A resource that records its release.
pub struct MockResource {
    name: &'static str,
    log: CallLog,
    release_error: Option<String>,
}

impl MockResource {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
            release_error: None,
        }
    }

    /// Makes `release` return an error.
    pub fn fail_release(mut self, reason: impl Into<String>) -> Self {
        self.release_error = Some(reason.into());
        self
    }
}

#[async_trait]
impl Resource for MockResource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn release(self: Box<Self>) -> Result<(), BoxError> {
        self.log.record(format!("{}.release", self.name));
        match self.release_error {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }
}
