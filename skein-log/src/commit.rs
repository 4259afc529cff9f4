//! Commit tracking.
//!
//! A commit mark is the highest offset a consumer has declared processed for
//! one log. Commits are declarative ("processed up to X"), so each commit
//! simply overwrites the previous mark; no compare-and-swap is needed.
//!
//! Two backings implement the same contract:
//!
//! - [`StoreCommitTracker`] keeps each mark under `commit:<key>` in the
//!   sequentially-consistent store, visible to every node.
//! - [`LocalCommitTracker`] keeps marks in a node-local map. It is only
//!   correct when all commit/list calls for a key reach the same node.

#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::try_join_all;
use skein_core::{LogKey, Offset};
use skein_kv::KvStore;
use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::keys;

// -----------------------------------------------------------------------------
// Commit Tracker Trait
// -----------------------------------------------------------------------------

/// Records and reports consumer commit marks.
#[async_trait]
pub trait CommitTracker: Send + Sync {
    /// Records `offset` as the commit mark of `key`, replacing any previous
    /// mark (even a higher one).
    async fn commit(&self, key: &LogKey, offset: Offset) -> LogResult<()>;

    /// Returns the commit mark of `key`, or `None` if nothing was committed.
    async fn committed(&self, key: &LogKey) -> LogResult<Option<Offset>>;

    /// Returns the commit marks of `keys`.
    ///
    /// Keys with no recorded commit are omitted. A failure on any key fails
    /// the whole call.
    async fn list_committed(&self, keys: &[LogKey]) -> LogResult<BTreeMap<LogKey, Offset>> {
        let lookups = keys.iter().map(|key| async move {
            let mark = self.committed(key).await?;
            Ok::<_, LogError>(mark.map(|offset| (key.clone(), offset)))
        });

        let marks = try_join_all(lookups).await?;
        Ok(marks.into_iter().flatten().collect())
    }
}

// -----------------------------------------------------------------------------
// Store-backed Tracker
// -----------------------------------------------------------------------------

/// Commit marks in the sequentially-consistent store.
#[derive(Debug, Clone)]
pub struct StoreCommitTracker<S> {
    store: S,
}

impl<S: KvStore> StoreCommitTracker<S> {
    /// Creates a tracker writing to `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: KvStore> CommitTracker for StoreCommitTracker<S> {
    async fn commit(&self, key: &LogKey, offset: Offset) -> LogResult<()> {
        let value = i64::try_from(offset)?;
        self.store.write(&keys::commit_key(key), value).await?;
        debug!(key = %key, offset = %offset, "Committed offset");
        Ok(())
    }

    async fn committed(&self, key: &LogKey) -> LogResult<Option<Offset>> {
        match self.store.read(&keys::commit_key(key)).await {
            Ok(value) => Ok(Some(Offset::try_from(value)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// -----------------------------------------------------------------------------
// Node-local Tracker
// -----------------------------------------------------------------------------

/// Commit marks in a node-local map.
///
/// The lock is held only for map access and never across an await.
#[derive(Debug, Default)]
pub struct LocalCommitTracker {
    marks: Mutex<HashMap<LogKey, Offset>>,
}

impl LocalCommitTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommitTracker for LocalCommitTracker {
    async fn commit(&self, key: &LogKey, offset: Offset) -> LogResult<()> {
        let mut marks = self.marks.lock().expect("commit marks lock poisoned");
        marks.insert(key.clone(), offset);
        debug!(key = %key, offset = %offset, "Committed offset locally");
        Ok(())
    }

    async fn committed(&self, key: &LogKey) -> LogResult<Option<Offset>> {
        let marks = self.marks.lock().expect("commit marks lock poisoned");
        Ok(marks.get(key).copied())
    }

    async fn list_committed(&self, keys: &[LogKey]) -> LogResult<BTreeMap<LogKey, Offset>> {
        let marks = self.marks.lock().expect("commit marks lock poisoned");
        Ok(keys
            .iter()
            .filter_map(|key| marks.get(key).map(|offset| (key.clone(), *offset)))
            .collect())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
