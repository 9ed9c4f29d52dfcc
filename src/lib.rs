//! # gram node
//!
//! A single-process key/value node built from three long-lived modules and a
//! small supervisor that owns them.
//!
//! ## Module Tour
//!
//! ### 1. The Supervisor ([`framework`])
//! Module traits ([`Service`](framework::Service), [`Resource`](framework::Resource)),
//! the one-slot [fault channel](framework::fault), the [signal listener](framework::signal),
//! the [`Supervisor`](framework::Supervisor) loop and the
//! [shutdown sequencer](framework::shutdown).
//!
//! ### 2. The Modules
//! - [`storage`]: the persistence handle, an in-memory map snapshotted to disk on close.
//! - [`execution`]: the processing module, an actor applying validated commands to storage.
//! - [`network`]: the transport module, a TCP server speaking JSON lines.
//!
//! Construction order is storage, execution, network. Teardown runs the other way.
//!
//! ### 3. The Orchestrator ([`lifecycle`])
//! Loads the [`config`], builds the modules with [`Node::bootstrap`](lifecycle::Node::bootstrap),
//! hands them to the supervisor and maps the outcome to a process exit status.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```
//!
//! The first run writes `$GRAM_HOME/config/gram.toml` (default `~/.gram`) with
//! every setting at its default.
//!
//! ## Testing
//!
//! See [`framework::mock`] for recording stand-ins of the module traits.
//!
//! ```bash
//! cargo test
//! ```

pub mod config;
pub mod execution;
pub mod framework;
pub mod lifecycle;
pub mod network;
pub mod storage;
