//! Key-value service client.
//!
//! [`RemoteKv`] implements [`KvStore`] by calling the `lin-kv` or `seq-kv`
//! service node through the runtime and mapping its replies.

use std::time::Duration;

use async_trait::async_trait;
use skein_kv::{Consistency, KvError, KvResult, KvStore};
use tracing::trace;

use crate::error::NodeError;
use crate::protocol::{ErrorCode, Payload};
use crate::runtime::Node;

/// A key-value service reached over the message protocol.
#[derive(Debug, Clone)]
pub struct RemoteKv {
    node: Node,
    consistency: Consistency,
    timeout: Duration,
}

impl RemoteKv {
    /// Creates a client for the service matching `consistency`.
    #[must_use]
    pub const fn new(node: Node, consistency: Consistency, timeout: Duration) -> Self {
        Self {
            node,
            consistency,
            timeout,
        }
    }

    /// Returns the service node this client talks to.
    #[must_use]
    pub const fn service(&self) -> &'static str {
        self.consistency.service_name()
    }

    async fn call(&self, operation: &'static str, key: &str, request: Payload) -> KvResult<Payload> {
        trace!(service = self.service(), operation, key, "KV call");
        match self.node.rpc(self.service(), request, self.timeout).await {
            Ok(Payload::Error { code, text }) => Err(map_error_reply(operation, key, code, text)),
            Ok(reply) => Ok(reply),
            Err(NodeError::Timeout { waited_us, .. }) => Err(KvError::Timeout {
                operation,
                key: key.to_string(),
                waited_us,
            }),
            Err(e) => Err(KvError::Unavailable {
                operation,
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl KvStore for RemoteKv {
    fn consistency(&self) -> Consistency {
        self.consistency
    }

    async fn read(&self, key: &str) -> KvResult<i64> {
        let request = Payload::Read {
            key: key.to_string(),
        };
        match self.call("read", key, request).await? {
            Payload::ReadOk { value } => Ok(value),
            other => Err(unexpected_reply("read", &other)),
        }
    }

    async fn write(&self, key: &str, value: i64) -> KvResult<()> {
        let request = Payload::Write {
            key: key.to_string(),
            value,
        };
        match self.call("write", key, request).await? {
            Payload::WriteOk => Ok(()),
            other => Err(unexpected_reply("write", &other)),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> KvResult<()> {
        let request = Payload::Cas {
            key: key.to_string(),
            from,
            to,
            create_if_not_exists: create_if_missing,
        };
        match self.call("cas", key, request).await? {
            Payload::CasOk => Ok(()),
            other => Err(unexpected_reply("cas", &other)),
        }
    }
}

fn map_error_reply(operation: &'static str, key: &str, code: u32, text: String) -> KvError {
    match ErrorCode::from_code(code) {
        Some(ErrorCode::KeyDoesNotExist) => KvError::KeyNotFound {
            key: key.to_string(),
        },
        Some(ErrorCode::PreconditionFailed) => KvError::PreconditionFailed {
            key: key.to_string(),
            message: text,
        },
        Some(ErrorCode::Timeout) => KvError::Timeout {
            operation,
            key: key.to_string(),
            waited_us: 0,
        },
        _ => KvError::Other {
            code,
            message: text,
        },
    }
}

fn unexpected_reply(operation: &'static str, reply: &Payload) -> KvError {
    KvError::Unavailable {
        operation,
        message: format!("unexpected reply '{}'", reply.kind()),
    }
}
