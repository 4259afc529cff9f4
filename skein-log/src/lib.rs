//! Append-only logs on top of single-key stores.
//!
//! This crate turns two external key-value stores into a set of independent,
//! string-keyed logs with durable records and consumer commit marks.
//!
//! # Overview
//!
//! - **Offset allocation**: [`OffsetAllocator`] grants strictly increasing,
//!   gap-free offsets per log with a compare-and-swap loop on the
//!   linearizable store. Every retry re-reads the counter first.
//! - **Record storage**: [`LogStore`] writes each record once under its own
//!   key (`log:<key>:<offset>`) and reads it back by offset.
//! - **Polling**: [`PollEngine`] walks forward from a start offset and stops at
//!   the first missing record.
//! - **Commit tracking**: a [`CommitTracker`] remembers the highest offset a
//!   consumer declared processed, either node-locally
//!   ([`LocalCommitTracker`]) or in the sequential store
//!   ([`StoreCommitTracker`]).
//!
//! [`LogService`] wires these together behind the four client operations:
//! `send`, `poll`, `commit_offsets` and `list_committed_offsets`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use skein_kv::SimulatedKvStore;
//! use skein_log::{LogConfig, LogService};
//!
//! let service = LogService::new(
//!     Arc::new(SimulatedKvStore::linearizable(42)),
//!     Arc::new(SimulatedKvStore::sequential(42)),
//!     LogConfig::for_testing(),
//! );
//!
//! let offset = service.send(&"k1".into(), 9).await?;
//! assert_eq!(offset.get(), 1);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod allocator;
mod commit;
mod config;
mod error;
pub mod keys;
mod poll;
mod record;
mod service;

pub use allocator::OffsetAllocator;
pub use commit::{CommitTracker, LocalCommitTracker, StoreCommitTracker};
pub use config::{CommitStrategy, LogConfig};
pub use error::{LogError, LogResult};
pub use poll::PollEngine;
pub use record::{LogStore, Record};
pub use service::LogService;
