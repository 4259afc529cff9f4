//! Skein node: the log service on the message protocol.
//!
//! A node reads newline-delimited JSON messages from its input, serves the
//! `send`, `poll`, `commit_offsets` and `list_committed_offsets` requests, and
//! keeps all of its state in two key-value service nodes (`lin-kv` and
//! `seq-kv`) that it reaches over the same protocol.
//!
//! # Components
//!
//! - [`protocol`]: message envelope, payloads and error codes
//! - [`Node`]: the runtime (dispatch, outbound calls, single writer)
//! - [`RemoteKv`]: `KvStore` over the key-value service nodes
//! - [`Router`]: maps requests onto `skein_log::LogService`
//!
//! # Example
//!
//! ```ignore
//! use tokio::io::{stdin, stdout, BufReader};
//!
//! skein_node::run(BufReader::new(stdin()), stdout(), NodeConfig::default()).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod kv;
pub mod protocol;
mod router;
mod runtime;

use std::sync::Arc;

use skein_kv::Consistency;
use skein_log::LogService;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::info;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use kv::RemoteKv;
pub use router::Router;
pub use runtime::{Handler, Identity, Node, Outbox};

/// Runs a log node over `input`/`output` until the input ends.
///
/// # Errors
///
/// Returns error if reading the input or writing the output fails.
pub async fn run<R, W>(input: R, output: W, config: NodeConfig) -> NodeResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (node, outbox) = Node::new();

    let lin = RemoteKv::new(node.clone(), Consistency::Linearizable, config.kv_timeout);
    let seq = RemoteKv::new(node.clone(), Consistency::Sequential, config.kv_timeout);
    info!(
        kv_timeout_ms = u64::try_from(config.kv_timeout.as_millis()).unwrap_or(u64::MAX),
        max_cas_attempts = config.log.max_cas_attempts,
        max_poll_records = ?config.log.max_poll_records,
        commit_strategy = %config.log.commit_strategy,
        "Starting node"
    );

    let service = LogService::new(Arc::new(lin), Arc::new(seq), config.log);
    let router = Arc::new(Router::new(service));

    node.serve(input, output, outbox, router).await
}
