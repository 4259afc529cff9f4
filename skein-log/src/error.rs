//! Log error types.

use skein_core::{LogKey, Offset};
use skein_kv::KvError;
use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur during log operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    /// Every allocation attempt lost its compare-and-swap race.
    #[error("offset allocation for {key} gave up after {attempts} attempts")]
    RetriesExhausted {
        /// The log being appended to.
        key: LogKey,
        /// Attempts made.
        attempts: u32,
    },

    /// A different record is already stored at this offset.
    #[error("offset {offset} of {key} already holds a different record")]
    OffsetConflict {
        /// The log.
        key: LogKey,
        /// The occupied offset.
        offset: Offset,
    },

    /// The offset can never address a record.
    #[error("offset {offset} of {key} is not a record offset")]
    InvalidOffset {
        /// The log.
        key: LogKey,
        /// The rejected offset.
        offset: Offset,
    },

    /// The allocator counter holds a value no allocator could have written.
    #[error("offset counter for {key} is corrupt: {value}")]
    CorruptCounter {
        /// The log.
        key: LogKey,
        /// The stored value.
        value: i64,
    },

    /// A value violated a core limit or constraint.
    #[error("{0}")]
    Core(#[from] skein_core::Error),

    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] KvError),
}
