//! Record storage.
//!
//! Records live one per store key, so appends and reads are single-key
//! operations; the store offers no range scans.

use skein_core::{LogKey, Offset};
use skein_kv::KvStore;
use tracing::{debug, trace};

use crate::error::{LogError, LogResult};
use crate::keys;

/// A record read back from a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Position of the record in its log.
    pub offset: Offset,
    /// Opaque payload.
    pub value: i64,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub const fn new(offset: Offset, value: i64) -> Self {
        Self { offset, value }
    }
}

/// Reads and writes records in the linearizable store.
#[derive(Debug, Clone)]
pub struct LogStore<S> {
    store: S,
}

impl<S: KvStore> LogStore<S> {
    /// Creates a record store over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes `value` at `offset` of `key`.
    ///
    /// `offset` must come from the allocator for the same log. The record is
    /// written once: it is created if absent, re-writing the identical value is
    /// a no-op, and any other value already present is a conflict.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOffset` for offset zero, `OffsetConflict` if a
    /// different record occupies the offset, or the store error.
    pub async fn append(&self, key: &LogKey, offset: Offset, value: i64) -> LogResult<()> {
        if !offset.is_record() {
            return Err(LogError::InvalidOffset {
                key: key.clone(),
                offset,
            });
        }

        let record_key = keys::record_key(key, offset);
        match self
            .store
            .compare_and_swap(&record_key, value, value, true)
            .await
        {
            Ok(()) => {
                trace!(key = %key, offset = %offset, value, "Appended record");
                Ok(())
            }
            Err(e) if e.is_precondition_failed() => {
                debug!(key = %key, offset = %offset, "Record offset already occupied");
                Err(LogError::OffsetConflict {
                    key: key.clone(),
                    offset,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the record at `offset` of `key`.
    ///
    /// Returns `None` if nothing is stored there.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub async fn read_at(&self, key: &LogKey, offset: Offset) -> LogResult<Option<Record>> {
        match self.store.read(&keys::record_key(key, offset)).await {
            Ok(value) => Ok(Some(Record::new(offset, value))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
