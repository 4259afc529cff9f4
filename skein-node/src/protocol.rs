//! Wire protocol.
//!
//! Messages are JSON objects, one per line:
//!
//! ```text
//! {"src":"c1","dest":"n1","body":{"type":"send","msg_id":1,"key":"k1","msg":9}}
//! ```
//!
//! The body carries a `type` tag, optional `msg_id`/`in_reply_to`
//! correlation fields and the type-specific payload fields.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_core::{LogKey, Offset};

// -----------------------------------------------------------------------------
// Envelope
// -----------------------------------------------------------------------------

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending node.
    pub src: String,
    /// Receiving node.
    pub dest: String,
    /// Message body.
    pub body: Body,
}

/// Message body: correlation fields plus the typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// Sender-unique message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    /// Id of the request this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
    /// Typed payload, flattened next to the correlation fields.
    #[serde(flatten)]
    pub payload: Payload,
}

impl Body {
    /// Creates a body with no correlation ids.
    #[must_use]
    pub const fn new(payload: Payload) -> Self {
        Self {
            msg_id: None,
            in_reply_to: None,
            payload,
        }
    }
}

// -----------------------------------------------------------------------------
// Payloads
// -----------------------------------------------------------------------------

/// Every payload type the node sends or understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Cluster membership handshake.
    Init {
        /// Id assigned to the receiving node.
        node_id: String,
        /// Every node in the cluster.
        #[serde(default)]
        node_ids: Vec<String>,
    },
    /// Handshake acknowledgement.
    InitOk,

    /// Append a value to a log.
    Send {
        /// Target log.
        key: LogKey,
        /// Value to append.
        msg: i64,
    },
    /// Offset granted to a sent value.
    SendOk {
        /// Granted offset.
        offset: Offset,
    },
    /// Read forward from start offsets.
    Poll {
        /// Start offset per log.
        offsets: BTreeMap<LogKey, Offset>,
    },
    /// Records per log as `[offset, value]` pairs.
    PollOk {
        /// Records per polled log.
        msgs: BTreeMap<LogKey, Vec<(Offset, i64)>>,
    },
    /// Record consumer progress.
    CommitOffsets {
        /// Commit mark per log.
        offsets: BTreeMap<LogKey, Offset>,
    },
    /// Commit acknowledgement.
    CommitOffsetsOk,
    /// Look up consumer progress.
    ListCommittedOffsets {
        /// Logs to look up.
        keys: Vec<LogKey>,
    },
    /// Commit marks of the logs that have one.
    ListCommittedOffsetsOk {
        /// Commit mark per log.
        offsets: BTreeMap<LogKey, Offset>,
    },

    /// Key-value store read.
    Read {
        /// Store key.
        key: String,
    },
    /// Key-value store read result.
    ReadOk {
        /// Stored value.
        value: i64,
    },
    /// Key-value store overwrite.
    Write {
        /// Store key.
        key: String,
        /// New value.
        value: i64,
    },
    /// Key-value store write acknowledgement.
    WriteOk,
    /// Key-value store compare-and-swap.
    Cas {
        /// Store key.
        key: String,
        /// Expected current value.
        from: i64,
        /// Replacement value.
        to: i64,
        /// Create the key holding `to` if it is absent.
        #[serde(default)]
        create_if_not_exists: bool,
    },
    /// Key-value store compare-and-swap acknowledgement.
    CasOk,

    /// Request failure.
    Error {
        /// Numeric error code.
        code: u32,
        /// Human-readable detail.
        #[serde(default)]
        text: String,
    },
}

impl Payload {
    /// Every `type` tag this protocol defines.
    pub const TYPES: &'static [&'static str] = &[
        "init",
        "init_ok",
        "send",
        "send_ok",
        "poll",
        "poll_ok",
        "commit_offsets",
        "commit_offsets_ok",
        "list_committed_offsets",
        "list_committed_offsets_ok",
        "read",
        "read_ok",
        "write",
        "write_ok",
        "cas",
        "cas_ok",
        "error",
    ];

    /// Returns the `type` tag of this payload.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::InitOk => "init_ok",
            Self::Send { .. } => "send",
            Self::SendOk { .. } => "send_ok",
            Self::Poll { .. } => "poll",
            Self::PollOk { .. } => "poll_ok",
            Self::CommitOffsets { .. } => "commit_offsets",
            Self::CommitOffsetsOk => "commit_offsets_ok",
            Self::ListCommittedOffsets { .. } => "list_committed_offsets",
            Self::ListCommittedOffsetsOk { .. } => "list_committed_offsets_ok",
            Self::Read { .. } => "read",
            Self::ReadOk { .. } => "read_ok",
            Self::Write { .. } => "write",
            Self::WriteOk => "write_ok",
            Self::Cas { .. } => "cas",
            Self::CasOk => "cas_ok",
            Self::Error { .. } => "error",
        }
    }
}

// -----------------------------------------------------------------------------
// Error Codes
// -----------------------------------------------------------------------------

/// Standard numeric error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request timed out; it may or may not have taken effect.
    Timeout,
    /// The destination node does not exist.
    NodeNotFound,
    /// The request type is not supported.
    NotSupported,
    /// The node cannot serve the request right now; retrying may succeed.
    TemporarilyUnavailable,
    /// The request is missing fields or has ill-typed fields.
    MalformedRequest,
    /// The node failed while handling the request.
    Crash,
    /// The request was aborted.
    Abort,
    /// The key does not exist.
    KeyDoesNotExist,
    /// The key already exists.
    KeyAlreadyExists,
    /// A precondition (such as a compare-and-swap `from`) did not hold.
    PreconditionFailed,
    /// A transaction conflicted with another.
    TxnConflict,
}

impl ErrorCode {
    /// Returns the numeric wire code.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Timeout => 0,
            Self::NodeNotFound => 1,
            Self::NotSupported => 10,
            Self::TemporarilyUnavailable => 11,
            Self::MalformedRequest => 12,
            Self::Crash => 13,
            Self::Abort => 14,
            Self::KeyDoesNotExist => 20,
            Self::KeyAlreadyExists => 21,
            Self::PreconditionFailed => 22,
            Self::TxnConflict => 30,
        }
    }

    /// Maps a numeric wire code back to its variant.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Timeout),
            1 => Some(Self::NodeNotFound),
            10 => Some(Self::NotSupported),
            11 => Some(Self::TemporarilyUnavailable),
            12 => Some(Self::MalformedRequest),
            13 => Some(Self::Crash),
            14 => Some(Self::Abort),
            20 => Some(Self::KeyDoesNotExist),
            21 => Some(Self::KeyAlreadyExists),
            22 => Some(Self::PreconditionFailed),
            30 => Some(Self::TxnConflict),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.code())
    }
}

/// A request failure to report to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {text}")]
pub struct RpcError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub text: String,
}

impl RpcError {
    /// Creates an error with the given code.
    pub fn new(code: ErrorCode, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Converts into an `error` payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        Payload::Error {
            code: self.code.code(),
            text: self.text,
        }
    }
}

// -----------------------------------------------------------------------------
// Decoding
// -----------------------------------------------------------------------------

/// A line that could not be decoded into a [`Message`].
///
/// Whatever routing information could be recovered is kept so the sender can
/// still be told why its request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Sender, if the envelope was readable.
    pub src: Option<String>,
    /// Intended receiver, if the envelope was readable.
    pub dest: Option<String>,
    /// Request id, if present.
    pub msg_id: Option<u64>,
    /// The failure to report.
    pub error: RpcError,
}

/// Decodes one line into a message.
///
/// An unknown `type` is rejected as `NotSupported`; anything else that does
/// not fit the expected shape is `MalformedRequest`.
///
/// # Errors
///
/// Returns a [`Rejection`] describing why the line was not a valid message.
pub fn decode(line: &str) -> Result<Message, Rejection> {
    let value: Value = serde_json::from_str(line).map_err(|e| Rejection {
        src: None,
        dest: None,
        msg_id: None,
        error: RpcError::new(ErrorCode::MalformedRequest, format!("invalid JSON: {e}")),
    })?;

    match Message::deserialize(&value) {
        Ok(message) => Ok(message),
        Err(e) => {
            let field = |name: &str| value.get(name).and_then(Value::as_str).map(String::from);
            let body = value.get("body");
            let kind = body.and_then(|b| b.get("type")).and_then(Value::as_str);

            let error = match kind {
                Some(kind) if !Payload::TYPES.contains(&kind) => {
                    RpcError::new(ErrorCode::NotSupported, format!("unsupported type '{kind}'"))
                }
                _ => RpcError::new(ErrorCode::MalformedRequest, e.to_string()),
            };

            Err(Rejection {
                src: field("src"),
                dest: field("dest"),
                msg_id: body.and_then(|b| b.get("msg_id")).and_then(Value::as_u64),
                error,
            })
        }
    }
}

/// Encodes a message as one line (without the trailing newline).
///
/// # Errors
///
/// Returns the serializer error; this only happens for payloads that cannot
/// be represented in JSON.
pub fn encode(message: &Message) -> serde_json::Result<String> {
    serde_json::to_string(message)
}
