//! Key-value store error types.

use thiserror::Error;

/// Result type for key-value store operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors a key-value store call can produce.
///
/// `KeyNotFound` and `PreconditionFailed` are expected outcomes that callers
/// recover from; everything else is a store failure to propagate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    /// The key has never been written.
    #[error("key does not exist: {key}")]
    KeyNotFound {
        /// The key that was read.
        key: String,
    },

    /// A compare-and-swap found a value other than the expected one.
    #[error("precondition failed for {key}: {message}")]
    PreconditionFailed {
        /// The key that was swapped.
        key: String,
        /// Store-provided detail.
        message: String,
    },

    /// The store did not answer within the call deadline.
    #[error("timeout: {operation} on {key} after {waited_us}us")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The key involved.
        key: String,
        /// How long we waited (in microseconds).
        waited_us: u64,
    },

    /// The store could not be reached or failed internally.
    #[error("store unavailable: {operation}: {message}")]
    Unavailable {
        /// The operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// The store replied with an error this facade does not model.
    #[error("store error {code}: {message}")]
    Other {
        /// Store error code.
        code: u32,
        /// Error message.
        message: String,
    },
}

impl KvError {
    /// Returns true if this is a lost compare-and-swap race.
    #[must_use]
    pub const fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    /// Returns true if the key was absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}
