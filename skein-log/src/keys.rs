//! Store key layout.
//!
//! Each durable value lives under its own store key:
//!
//! | Value | Store | Key |
//! |---|---|---|
//! | allocator counter | linearizable | `offset:<log>` |
//! | record | linearizable | `log:<log>:<offset>` |
//! | commit mark | sequential | `commit:<log>` |
//!
//! The offset is always the last `:`-separated segment of a record key, so log
//! keys may themselves contain `:` without two records colliding.

use skein_core::{LogKey, Offset};

/// Prefix of allocator counter keys.
pub const COUNTER_PREFIX: &str = "offset:";
/// Prefix of record keys.
pub const RECORD_PREFIX: &str = "log:";
/// Prefix of commit mark keys.
pub const COMMIT_PREFIX: &str = "commit:";

/// Returns the key holding the last offset granted for `key`.
#[must_use]
pub fn counter_key(key: &LogKey) -> String {
    format!("{COUNTER_PREFIX}{key}")
}

/// Returns the key holding the record at `offset` of `key`.
#[must_use]
pub fn record_key(key: &LogKey, offset: Offset) -> String {
    format!("{RECORD_PREFIX}{key}:{offset}")
}

/// Returns the key holding the commit mark of `key`.
#[must_use]
pub fn commit_key(key: &LogKey) -> String {
    format!("{COMMIT_PREFIX}{key}")
}
