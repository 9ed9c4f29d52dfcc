//! `gram`: runs a single gram node until it is told to stop or a module fails.
//!
//! ```bash
//! GRAM_HOME=/tmp/gram RUST_LOG=debug gram
//! ```

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    gram_node::lifecycle::run().await.into()
}
