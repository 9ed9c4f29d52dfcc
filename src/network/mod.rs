//! # Network (transport module)
//!
//! A TCP server speaking the line protocol in [`protocol`]. Constructed last,
//! from the execution client and the storage handle; started and stopped by
//! the supervisor.
//!
//! ## Construction
//! 1. Load the node identity from storage, or generate and store a new one.
//! 2. Bind the listener. A port already in use fails construction, so the
//!    node never reaches `Running` half-wired.
//!
//! ## Running
//! [`Service::start`] spawns the accept loop. Each connection runs in its own
//! task. If `accept` fails the loop reports one fault and stops accepting.
//! The loop pulls connections from an [`Accept`] source, a bound
//! [`TcpListener`] in production.
//!
//! ## Stopping
//! [`Service::shutdown`] flips a `watch` flag observed by the accept loop and
//! every connection, then waits for all of them to exit.

pub mod connection;
pub mod error;
pub mod protocol;

pub use connection::ConnectionContext;
pub use error::*;

use crate::config::NetworkConfig;
use crate::execution::ExecutionClient;
use crate::framework::{BoxError, Fault, FaultSender, Service};
use crate::storage::Storage;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// Storage key of the node identity.
pub const NODE_ID_KEY: &str = "__network/node_id";

/// Source of inbound connections for the accept loop.
#[async_trait]
pub trait Accept: Send + Sync + 'static {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Accept for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

pub struct Network {
    ctx: ConnectionContext,
    faults: FaultSender,
    listener: Option<Box<dyn Accept>>,
    local_addr: SocketAddr,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Network {
    pub async fn new(
        faults: FaultSender,
        execution: ExecutionClient,
        storage: Storage,
        config: &NetworkConfig,
    ) -> Result<Self, NetworkError> {
        let node_id = load_or_create_node_id(&storage)?;

        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| NetworkError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| NetworkError::Bind { addr, source })?;
        info!(%node_id, %local_addr, "Network constructed");

        let (stop, _) = watch::channel(false);
        Ok(Self {
            ctx: ConnectionContext {
                node_id: node_id.into(),
                execution,
            },
            faults,
            listener: Some(Box::new(listener)),
            local_addr,
            stop,
            task: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn node_id(&self) -> &str {
        &self.ctx.node_id
    }

    /// Serves connections from `source` instead of the bound listener.
    ///
    /// Has no effect once the network has started.
    pub fn with_acceptor(mut self, source: impl Accept) -> Self {
        if self.listener.is_some() {
            self.listener = Some(Box::new(source));
        }
        self
    }
}

/// Recovers the node identity from storage, or creates and stores a new one.
fn load_or_create_node_id(storage: &Storage) -> Result<String, NetworkError> {
    if let Some(id) = storage.get_opt(NODE_ID_KEY)? {
        uuid::Uuid::parse_str(&id).map_err(|_| NetworkError::InvalidIdentity(id.clone()))?;
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    storage.set(NODE_ID_KEY, id.clone())?;
    Ok(id)
}

async fn accept_loop(
    listener: Box<dyn Accept>,
    ctx: ConnectionContext,
    faults: FaultSender,
    mut stop: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    let conn_stop = stop.clone();

    loop {
        tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(connection::serve(stream, peer, ctx.clone(), conn_stop.clone()));
                }
                Err(e) => {
                    error!(error = %e, "Accept failed, network stops serving");
                    faults.report(Fault::module("network", NetworkError::Accept(e)));
                    break;
                }
            },
            Some(done) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = done {
                    warn!(error = %e, "Connection task failed");
                }
            }
        }
    }

    drop(listener);
    while let Some(done) = connections.join_next().await {
        if let Err(e) = done {
            warn!(error = %e, "Connection task failed");
        }
    }
    info!("Accept loop stopped");
}

#[async_trait]
impl Service for Network {
    fn name(&self) -> &'static str {
        "network"
    }

    fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            warn!("Network already started");
            return;
        };
        info!(addr = %self.local_addr, "Network serving");
        self.task = Some(tokio::spawn(accept_loop(
            listener,
            self.ctx.clone(),
            self.faults.clone(),
            self.stop.subscribe(),
        )));
    }

    async fn shutdown(self: Box<Self>) -> Result<(), BoxError> {
        let Network { stop, task, .. } = *self;
        stop.send_replace(true);
        if let Some(task) = task {
            task.await.map_err(NetworkError::from)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionConfig, StorageConfig};
    use crate::execution::Execution;
    use crate::framework::fault;
    use protocol::Response;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn any_port() -> NetworkConfig {
        NetworkConfig {
            port: 0,
            ..NetworkConfig::default()
        }
    }

    async fn request(stream: &mut BufReader<TcpStream>, line: &str) -> Response {
        stream.get_mut().write_all(format!("{line}\n").as_bytes()).await.unwrap();
        let mut reply = String::new();
        stream.read_line(&mut reply).await.unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn serves_requests_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&StorageConfig::new(dir.path())).await.unwrap();
        let execution = Execution::new(storage.clone(), &ExecutionConfig::default()).unwrap();
        let (faults, _rx) = fault::channel();

        let mut network = Network::new(faults, execution.client(), storage.clone(), &any_port())
            .await
            .unwrap();
        let addr = network.local_addr();
        network.start();

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        let put = request(&mut client, r#"{"op":"put","key":"a","value":"1"}"#).await;
        assert_eq!(put, Response::ok(1));
        let get = request(&mut client, r#"{"op":"get","key":"a"}"#).await;
        assert_eq!(get, Response::ok("1"));
        let bad = request(&mut client, r#"{"op":"get","key":"__network/node_id"}"#).await;
        assert!(!bad.ok);
        let garbage = request(&mut client, "not json").await;
        assert!(garbage.error.unwrap().starts_with("bad request"));

        Box::new(network).shutdown().await.unwrap();

        let mut rest = String::new();
        assert_eq!(client.read_line(&mut rest).await.unwrap(), 0, "server closed the connection");

        execution.release().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_is_not_held_up_by_a_client_that_stops_reading() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&StorageConfig::new(dir.path())).await.unwrap();
        let execution = Execution::new(storage.clone(), &ExecutionConfig::default()).unwrap();
        let (faults, _rx) = fault::channel();

        let mut network = Network::new(faults, execution.client(), storage, &any_port())
            .await
            .unwrap();
        let addr = network.local_addr();
        network.start();

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        let big = "x".repeat(60_000);
        let put = request(&mut client, &format!(r#"{{"op":"put","key":"big","value":"{big}"}}"#)).await;
        assert!(put.ok);

        // Pipeline far more replies than the socket buffers hold, then stop reading.
        let burst = format!("{}\n", r#"{"op":"get","key":"big"}"#).repeat(2000);
        client.get_mut().write_all(burst.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(5), Box::new(network).shutdown()).await;
        assert!(matches!(stopped, Ok(Ok(()))), "shutdown waited on a stalled client");

        execution.release().await.unwrap();
    }

    #[tokio::test]
    async fn oversized_request_line_closes_the_connection() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&StorageConfig::new(dir.path())).await.unwrap();
        let limits = ExecutionConfig {
            max_key_len: 8,
            max_value_len: 16,
            ..ExecutionConfig::default()
        };
        let execution = Execution::new(storage.clone(), &limits).unwrap();
        let max = execution.client().limits().max_request_len();
        let (faults, _rx) = fault::channel();

        let mut network = Network::new(faults, execution.client(), storage, &any_port())
            .await
            .unwrap();
        let addr = network.local_addr();
        network.start();

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        let oversized = "x".repeat(max + 100) + "\n";
        client.get_mut().write_all(oversized.as_bytes()).await.unwrap();

        let mut reply = String::new();
        client.read_line(&mut reply).await.unwrap();
        let reply: Response = serde_json::from_str(&reply).unwrap();
        assert!(!reply.ok);
        assert!(reply.error.unwrap().contains("exceeds"));
        let mut rest = String::new();
        assert!(
            !matches!(client.read_line(&mut rest).await, Ok(n) if n > 0),
            "connection stays closed after an oversized line"
        );

        let mut fresh = BufReader::new(TcpStream::connect(addr).await.unwrap());
        assert!(request(&mut fresh, r#"{"op":"status"}"#).await.ok);

        Box::new(network).shutdown().await.unwrap();
        execution.release().await.unwrap();
    }

    #[tokio::test]
    async fn node_id_is_stable_across_constructions() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&StorageConfig::new(dir.path())).await.unwrap();
        let execution = Execution::new(storage.clone(), &ExecutionConfig::default()).unwrap();
        let (faults, _rx) = fault::channel();

        let first = Network::new(faults.clone(), execution.client(), storage.clone(), &any_port())
            .await
            .unwrap();
        let second = Network::new(faults, execution.client(), storage.clone(), &any_port())
            .await
            .unwrap();

        assert_eq!(first.node_id(), second.node_id());
        assert_eq!(storage.get(NODE_ID_KEY).unwrap(), first.node_id());
        execution.release().await.unwrap();
    }

    #[tokio::test]
    async fn port_in_use_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&StorageConfig::new(dir.path())).await.unwrap();
        let execution = Execution::new(storage.clone(), &ExecutionConfig::default()).unwrap();
        let (faults, _rx) = fault::channel();

        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkConfig {
            port: taken.local_addr().unwrap().port(),
            ..NetworkConfig::default()
        };

        let err = Network::new(faults, execution.client(), storage, &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NetworkError::Bind { .. }));
        execution.release().await.unwrap();
    }
}
