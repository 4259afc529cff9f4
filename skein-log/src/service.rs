//! Log service: the four client operations.
//!
//! `send` allocates an offset and then writes the record. The two steps are
//! not atomic: if the write fails after a successful allocation, that offset
//! is burnt and polls will stop in front of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use skein_core::{LogKey, Offset};
use skein_kv::{Consistency, KvStore};
use tracing::{debug, warn};

use crate::allocator::OffsetAllocator;
use crate::commit::{CommitTracker, LocalCommitTracker, StoreCommitTracker};
use crate::config::{CommitStrategy, LogConfig};
use crate::error::{LogError, LogResult};
use crate::poll::PollEngine;
use crate::record::{LogStore, Record};

/// Shared store handle.
type SharedStore = Arc<dyn KvStore>;

/// Append-only logs with consumer commit tracking.
///
/// # Thread Safety
///
/// The service is `Send + Sync` and is shared across request tasks.
pub struct LogService {
    allocator: OffsetAllocator<SharedStore>,
    log: LogStore<SharedStore>,
    poller: PollEngine<SharedStore>,
    commits: Box<dyn CommitTracker>,
    config: LogConfig,
}

impl LogService {
    /// Creates a service over a linearizable store (offsets and records) and a
    /// sequentially-consistent store (commit marks).
    ///
    /// # Panics
    ///
    /// Panics if `config.max_cas_attempts` is zero.
    #[must_use]
    pub fn new(linearizable: SharedStore, sequential: SharedStore, config: LogConfig) -> Self {
        if linearizable.consistency() != Consistency::Linearizable {
            warn!(
                consistency = ?linearizable.consistency(),
                "Offsets allocated on a store that is not linearizable"
            );
        }

        let commits: Box<dyn CommitTracker> = match config.commit_strategy {
            CommitStrategy::Store => Box::new(StoreCommitTracker::new(sequential)),
            CommitStrategy::Local => Box::new(LocalCommitTracker::new()),
        };

        let log = LogStore::new(Arc::clone(&linearizable));
        Self {
            allocator: OffsetAllocator::new(Arc::clone(&linearizable), config.max_cas_attempts),
            poller: PollEngine::new(log.clone(), config.max_poll_records),
            log,
            commits,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Appends `value` to the log `key` and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns error if the key is too long, allocation fails, or the record
    /// write fails.
    pub async fn send(&self, key: &LogKey, value: i64) -> LogResult<Offset> {
        self.check_key(key)?;

        let offset = self.allocator.allocate(key).await?;
        if let Err(e) = self.log.append(key, offset, value).await {
            warn!(key = %key, offset = %offset, error = %e, "Record write failed after allocation, offset burnt");
            return Err(e);
        }

        debug!(key = %key, offset = %offset, "Sent record");
        Ok(offset)
    }

    /// Returns the contiguous run of records from each requested start offset.
    ///
    /// # Errors
    ///
    /// Returns error if any store read fails.
    pub async fn poll(
        &self,
        offsets: &BTreeMap<LogKey, Offset>,
    ) -> LogResult<BTreeMap<LogKey, Vec<Record>>> {
        self.poller.poll(offsets).await
    }

    /// Records a commit mark for every key in `offsets`.
    ///
    /// # Errors
    ///
    /// Returns error if any commit fails. Marks for other keys in the same
    /// call may already have been written.
    pub async fn commit_offsets(&self, offsets: &BTreeMap<LogKey, Offset>) -> LogResult<()> {
        let commits = offsets
            .iter()
            .map(|(key, offset)| self.commits.commit(key, *offset));
        try_join_all(commits).await?;
        Ok(())
    }

    /// Returns the commit marks of `keys`, omitting keys never committed.
    ///
    /// # Errors
    ///
    /// Returns error if any lookup fails.
    pub async fn list_committed_offsets(
        &self,
        keys: &[LogKey],
    ) -> LogResult<BTreeMap<LogKey, Offset>> {
        self.commits.list_committed(keys).await
    }

    fn check_key(&self, key: &LogKey) -> LogResult<()> {
        let len = key.len() as u64;
        if len > u64::from(self.config.max_log_key_bytes) {
            return Err(LogError::Core(skein_core::Error::LimitExceeded {
                limit: "log_key_bytes",
                max: u64::from(self.config.max_log_key_bytes),
                actual: len,
            }));
        }
        Ok(())
    }
}
