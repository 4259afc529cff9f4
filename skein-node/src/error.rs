//! Node error types.

use std::io;

/// Errors from the node runtime.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// I/O error on the input or output stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to encode an outbound message.
    #[error("encode error: {message}")]
    Encode {
        /// Error details.
        message: String,
    },

    /// An outbound call was attempted before `init`.
    #[error("node has not received init")]
    NotInitialized,

    /// An outbound call got no reply in time.
    #[error("no reply from {dest} to msg {msg_id} after {waited_us}us")]
    Timeout {
        /// Destination node.
        dest: String,
        /// Id of the unanswered message.
        msg_id: u64,
        /// How long we waited (in microseconds).
        waited_us: u64,
    },

    /// The runtime stopped while a call was in flight.
    #[error("node runtime closed")]
    Closed,

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] skein_core::Error),
}

impl NodeError {
    /// Creates an encode error from any error type.
    pub fn encode<E: std::fmt::Display>(e: E) -> Self {
        Self::Encode {
            message: e.to_string(),
        }
    }
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
