//! Key-value store facade for Skein.
//!
//! Skein keeps every durable value in external key-value stores that offer
//! only three single-key operations:
//!
//! - `read(key) -> value | KeyNotFound`
//! - `write(key, value)` (unconditional overwrite)
//! - `compare_and_swap(key, from, to, create_if_missing) -> ok | PreconditionFailed | other`
//!
//! Two store instances are used: a linearizable one for offsets and records
//! and a sequentially-consistent one for commit marks. Both are reached
//! through the [`KvStore`] trait, so the log layer never knows whether it is
//! talking to a remote service or to the in-memory [`SimulatedKvStore`].
//!
//! # Testing
//!
//! The [`SimulatedKvStore`] provides deterministic fault injection:
//!
//! ```ignore
//! use skein_kv::{Consistency, KvFaultConfig, SimulatedKvStore};
//!
//! let config = KvFaultConfig::flaky(); // 5% failure rate
//! let store = SimulatedKvStore::with_faults(Consistency::Linearizable, seed, config);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod simulated;
mod store;

pub use error::{KvError, KvResult};
pub use simulated::{KvFaultConfig, KvOpCounts, SimulatedKvStore};
pub use store::{Consistency, KvStore};
