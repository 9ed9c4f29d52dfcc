use async_trait::async_trait;
use gram_node::config::{AppConfig, NetworkConfig, StorageConfig};
use gram_node::framework::mock::CallLog;
use gram_node::framework::{fault, BoxError, Fault, Phase, PhaseTracker, Resource, Service, Supervisor};
use gram_node::lifecycle::{self, Exit, Node};
use gram_node::network::protocol::Response;
use gram_node::network::Accept;
use std::future::pending;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

fn config_in(root: &Path) -> AppConfig {
    AppConfig {
        storage: StorageConfig::new(root),
        network: NetworkConfig {
            port: 0,
            ..NetworkConfig::default()
        },
        ..AppConfig::default()
    }
}

fn snapshot_of(config: &AppConfig) -> std::path::PathBuf {
    config.storage.path.join(&config.storage.snapshot_file)
}

async fn request(stream: &mut BufReader<TcpStream>, line: &str) -> Response {
    stream
        .get_mut()
        .write_all(format!("{line}\n").as_bytes())
        .await
        .unwrap();
    let mut reply = String::new();
    stream.read_line(&mut reply).await.unwrap();
    serde_json::from_str(&reply).unwrap()
}

/// A listener whose every `accept` fails.
struct BrokenListener {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Accept for BrokenListener {
    async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::other("listener crashed"))
    }
}

/// Logs `<name>.stopped` / `<name>.released` once the wrapped module is done.
struct Recorded<T: ?Sized> {
    inner: Box<T>,
    log: CallLog,
}

impl<T: ?Sized> Recorded<T> {
    fn new(inner: Box<T>, log: &CallLog) -> Self {
        Self {
            inner,
            log: log.clone(),
        }
    }
}

#[async_trait]
impl Service for Recorded<dyn Service> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn start(&mut self) {
        self.inner.start();
    }

    async fn shutdown(self: Box<Self>) -> Result<(), BoxError> {
        let Recorded { inner, log } = *self;
        let name = inner.name();
        let result = inner.shutdown().await;
        log.record(format!("{name}.stopped"));
        result
    }
}

#[async_trait]
impl Resource for Recorded<dyn Resource> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn release(self: Box<Self>) -> Result<(), BoxError> {
        let Recorded { inner, log } = *self;
        let name = inner.name();
        let result = inner.release().await;
        log.record(format!("{name}.released"));
        result
    }
}

/// Healthy startup: every module is built, the node reaches `Running` and serves requests.
#[tokio::test]
async fn node_serves_after_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let (faults, receiver) = fault::channel();
    let node = Node::bootstrap(&config, faults.clone()).await.unwrap();
    let addr = node.network.local_addr();
    let storage = node.storage.clone();

    let phase = PhaseTracker::new();
    phase.advance(Phase::Initializing);
    let supervisor = node.into_supervisor(phase, (faults, receiver));
    let mut phases = supervisor.subscribe();

    let (stop, signal) = oneshot::channel::<()>();
    let run = tokio::spawn(supervisor.run(async move {
        let _ = signal.await;
        Ok(())
    }));
    phases.wait_for(|p| *p == Phase::Running).await.unwrap();

    let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
    assert_eq!(
        request(&mut client, r#"{"op":"put","key":"greeting","value":"hello"}"#).await,
        Response::ok(1)
    );
    assert_eq!(
        request(&mut client, r#"{"op":"get","key":"greeting"}"#).await,
        Response::ok("hello")
    );
    let status = request(&mut client, r#"{"op":"status"}"#).await;
    assert!(status.ok);
    assert_eq!(status.value.unwrap()["applied"], 1);

    stop.send(()).unwrap();
    let outcome = run.await.unwrap();
    assert!(outcome.is_clean());
    assert!(storage.is_closed());
}

/// Transport construction fails after storage and execution were built:
/// nothing is started and storage is never closed.
#[tokio::test]
async fn port_in_use_exits_without_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = config_in(dir.path());
    config.network.port = taken.local_addr().unwrap().port();

    let phase = PhaseTracker::new();
    let phases = phase.subscribe();
    let exit = lifecycle::run_tracked(&config, phase, pending::<std::io::Result<()>>()).await;

    assert_eq!(exit, Exit::Init);
    assert_eq!(exit.code(), 3);
    assert_eq!(*phases.borrow(), Phase::Terminated);
    assert!(!snapshot_of(&config).exists(), "storage was closed");
}

/// External termination: one fault consumed, transport stopped, storage
/// released, phase ends at `Terminated`, exit status 0.
#[tokio::test]
async fn termination_signal_stops_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let phase = PhaseTracker::new();
    let mut phases = phase.subscribe();
    let (stop, signal) = oneshot::channel::<()>();

    let (exit, _) = tokio::join!(
        lifecycle::run_tracked(&config, phase, async move {
            let _ = signal.await;
            Ok(())
        }),
        async move {
            phases.wait_for(|p| *p == Phase::Running).await.unwrap();
            stop.send(()).unwrap();
            phases.wait_for(|p| *p == Phase::Terminated).await.unwrap();
        }
    );

    assert_eq!(exit, Exit::Stopped);
    assert_eq!(exit.code(), 0);
    let snapshot = std::fs::read_to_string(snapshot_of(&config)).unwrap();
    assert!(snapshot.contains("__network/node_id"));
}

/// A module fault takes the same teardown path as a signal.
#[tokio::test]
async fn module_fault_tears_down_real_modules() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let (faults, receiver) = fault::channel();
    let node = Node::bootstrap(&config, faults.clone()).await.unwrap();
    let storage = node.storage.clone();
    let execution = node.execution.client();

    let phase = PhaseTracker::new();
    phase.advance(Phase::Initializing);
    let reporter = faults.clone();
    let supervisor = node.into_supervisor(phase, (faults, receiver));
    let mut phases = supervisor.subscribe();
    let run = tokio::spawn(supervisor.run(pending::<std::io::Result<()>>()));

    phases.wait_for(|p| *p == Phase::Running).await.unwrap();
    execution.put("k", "v").await.unwrap();
    assert!(reporter.report(Fault::module("network", "listener crashed")));
    assert!(!reporter.report(Fault::Interrupted), "only the first fault is consumed");

    let outcome = run.await.unwrap();
    assert!(matches!(outcome.fault, Fault::Module { module: "network", .. }));
    assert!(outcome.teardown_errors.is_empty());
    assert!(storage.is_closed());
    assert!(execution.applied().await.is_err(), "execution actor stopped");

    let snapshot = std::fs::read_to_string(snapshot_of(&config)).unwrap();
    assert!(snapshot.contains("\"k\""));
}

/// Data written before shutdown is visible to the next run.
#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    for round in 1..=2u64 {
        let (faults, receiver) = fault::channel();
        let node = Node::bootstrap(&config, faults.clone()).await.unwrap();
        let client = node.execution.client();
        let node_id = node.network.node_id().to_owned();

        assert_eq!(client.put("round", round.to_string()).await.unwrap(), round);

        let phase = PhaseTracker::new();
        phase.advance(Phase::Initializing);
        let outcome = node
            .into_supervisor(phase, (faults, receiver))
            .run(async { Ok(()) })
            .await;
        assert!(outcome.is_clean());

        let snapshot = std::fs::read_to_string(snapshot_of(&config)).unwrap();
        assert!(snapshot.contains(&node_id));
    }
}

/// The transport's own accept failure reports exactly one fault and drives
/// the reverse-order teardown of the real modules.
#[tokio::test]
async fn accept_failure_tears_down_in_reverse_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let (faults, receiver) = fault::channel();
    let node = Node::bootstrap(&config, faults.clone()).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let network = node.network.with_acceptor(BrokenListener {
        calls: calls.clone(),
    });
    let storage = node.storage.clone();

    let log = CallLog::new();
    let phase = PhaseTracker::new();
    phase.advance(Phase::Initializing);
    let supervisor = Supervisor::new(
        phase,
        (faults, receiver),
        Box::new(Recorded::<dyn Service>::new(Box::new(network), &log)),
        vec![
            Box::new(Recorded::<dyn Resource>::new(Box::new(node.execution), &log)),
            Box::new(Recorded::<dyn Resource>::new(Box::new(node.storage), &log)),
        ],
    );
    let phases = supervisor.subscribe();

    let outcome = supervisor.run(pending::<std::io::Result<()>>()).await;

    match &outcome.fault {
        Fault::Module { module, source } => {
            assert_eq!(*module, "network");
            assert!(source.to_string().contains("listener crashed"));
        }
        other => panic!("unexpected fault: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "accept loop stopped after one failure");
    assert!(outcome.teardown_errors.is_empty());
    assert_eq!(
        log.calls(),
        vec!["network.stopped", "execution.released", "storage.released"]
    );
    assert_eq!(*phases.borrow(), Phase::Terminated);
    assert!(storage.is_closed());
}
