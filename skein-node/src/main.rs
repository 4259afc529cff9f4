//! Skein node binary.
//!
//! Speaks the message protocol on stdin/stdout. Logs go to stderr.
//!
//! ```bash
//! skein-node --log-level debug --kv-timeout-ms 500 --commit-strategy store
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

use clap::Parser;
use skein_core::Limits;
use skein_log::CommitStrategy;
use skein_node::NodeConfig;
use tokio::io::{stdin, stdout, BufReader};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Skein log node.
#[derive(Parser, Debug)]
#[command(name = "skein-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Deadline for a single key-value service call, in milliseconds.
    #[arg(long, default_value = "1000")]
    kv_timeout_ms: u64,

    /// Compare-and-swap attempts per offset allocation.
    #[arg(long, default_value = "100")]
    max_cas_attempts: u32,

    /// Maximum records returned per key by one poll (0 = unbounded).
    #[arg(long, default_value = "0")]
    max_poll_records: u32,

    /// Maximum log key size in bytes.
    #[arg(long, default_value = "1024")]
    max_log_key_bytes: u32,

    /// Where commit marks are kept (`local` or `store`).
    #[arg(long, default_value = "store")]
    commit_strategy: CommitStrategy,
}

impl Args {
    fn limits(&self) -> Limits {
        let mut limits = Limits::new();
        limits.max_cas_attempts = self.max_cas_attempts;
        limits.max_poll_records = self.max_poll_records;
        limits.max_log_key_bytes = self.max_log_key_bytes;
        limits.kv_timeout_us = self.kv_timeout_ms.saturating_mul(1000);
        limits
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Stdout carries the protocol; logs must go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let limits = args.limits();
    limits.validate()?;

    let config = NodeConfig::from_limits(&limits)
        .with_kv_timeout(Duration::from_millis(args.kv_timeout_ms))
        .with_commit_strategy(args.commit_strategy);

    info!(pid = std::process::id(), "Starting skein node");
    skein_node::run(BufReader::new(stdin()), stdout(), config).await?;
    info!("Input closed, exiting");

    Ok(())
}
