//! Request router.
//!
//! Maps the four log requests onto [`LogService`] and log failures onto
//! error codes.

use async_trait::async_trait;
use skein_kv::KvError;
use skein_log::{LogError, LogService};

use crate::protocol::{ErrorCode, Payload, RpcError};
use crate::runtime::Handler;

/// Serves `send`, `poll`, `commit_offsets` and `list_committed_offsets`.
pub struct Router {
    service: LogService,
}

impl Router {
    /// Creates a router over `service`.
    #[must_use]
    pub const fn new(service: LogService) -> Self {
        Self { service }
    }

    /// Returns the log service.
    #[must_use]
    pub const fn service(&self) -> &LogService {
        &self.service
    }
}

#[async_trait]
impl Handler for Router {
    async fn handle(&self, payload: Payload) -> Result<Payload, RpcError> {
        match payload {
            Payload::Send { key, msg } => {
                let offset = self.service.send(&key, msg).await?;
                Ok(Payload::SendOk { offset })
            }
            Payload::Poll { offsets } => {
                let polled = self.service.poll(&offsets).await?;
                let msgs = polled
                    .into_iter()
                    .map(|(key, records)| {
                        let pairs = records.into_iter().map(|r| (r.offset, r.value)).collect();
                        (key, pairs)
                    })
                    .collect();
                Ok(Payload::PollOk { msgs })
            }
            Payload::CommitOffsets { offsets } => {
                self.service.commit_offsets(&offsets).await?;
                Ok(Payload::CommitOffsetsOk)
            }
            Payload::ListCommittedOffsets { keys } => {
                let offsets = self.service.list_committed_offsets(&keys).await?;
                Ok(Payload::ListCommittedOffsetsOk { offsets })
            }
            other => Err(RpcError::new(
                ErrorCode::NotSupported,
                format!("unsupported request '{}'", other.kind()),
            )),
        }
    }
}

impl From<LogError> for RpcError {
    fn from(e: LogError) -> Self {
        let code = match &e {
            LogError::RetriesExhausted { .. } => ErrorCode::TemporarilyUnavailable,
            LogError::OffsetConflict { .. } => ErrorCode::PreconditionFailed,
            LogError::InvalidOffset { .. } | LogError::Core(_) => ErrorCode::MalformedRequest,
            LogError::Store(KvError::Timeout { .. }) => ErrorCode::Timeout,
            LogError::CorruptCounter { .. } | LogError::Store(_) => ErrorCode::Crash,
        };
        Self::new(code, e.to_string())
    }
}
