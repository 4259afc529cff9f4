//! Offset allocation.
//!
//! Offsets are granted from a per-log counter in the linearizable store. The
//! counter holds the last granted offset and only ever moves by
//! compare-and-swap from `last` to `last + 1`, so each value has exactly one
//! winner. A loser re-reads the counter before trying again: retrying with a
//! value already known to be stale can never succeed.

use skein_core::{LogKey, Offset};
use skein_kv::KvStore;
use tracing::{debug, warn};

use crate::error::{LogError, LogResult};
use crate::keys;

/// Grants unique, strictly increasing offsets per log.
#[derive(Debug, Clone)]
pub struct OffsetAllocator<S> {
    /// Linearizable store holding the counters.
    store: S,
    /// Attempts before giving up on one allocation.
    max_attempts: u32,
}

impl<S: KvStore> OffsetAllocator<S> {
    /// Creates an allocator over `store`.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    #[must_use]
    pub fn new(store: S, max_attempts: u32) -> Self {
        assert!(max_attempts > 0, "max_attempts must be positive");
        Self {
            store,
            max_attempts,
        }
    }

    /// Allocates the next offset of `key`.
    ///
    /// The first offset of every log is 1.
    ///
    /// # Errors
    ///
    /// Returns `RetriesExhausted` if every attempt lost its race, or the store
    /// error if a read or compare-and-swap fails for any other reason.
    pub async fn allocate(&self, key: &LogKey) -> LogResult<Offset> {
        let counter_key = keys::counter_key(key);
        let mut last = self.read_counter(key, &counter_key).await?;

        for attempt in 1..=self.max_attempts {
            let next = last.next();
            let from = i64::try_from(last)?;
            let to = i64::try_from(next)?;

            match self
                .store
                .compare_and_swap(&counter_key, from, to, true)
                .await
            {
                Ok(()) => {
                    debug!(key = %key, offset = %next, attempt, "Allocated offset");
                    return Ok(next);
                }
                Err(e) if e.is_precondition_failed() => {
                    debug!(key = %key, stale = %last, attempt, "Lost allocation race, re-reading counter");
                    last = self.read_counter(key, &counter_key).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(key = %key, attempts = self.max_attempts, "Offset allocation retries exhausted");
        Err(LogError::RetriesExhausted {
            key: key.clone(),
            attempts: self.max_attempts,
        })
    }

    /// Returns the last offset granted for `key`, or zero if none.
    ///
    /// # Errors
    ///
    /// Returns error if the store read fails.
    pub async fn last_allocated(&self, key: &LogKey) -> LogResult<Offset> {
        self.read_counter(key, &keys::counter_key(key)).await
    }

    async fn read_counter(&self, key: &LogKey, counter_key: &str) -> LogResult<Offset> {
        match self.store.read(counter_key).await {
            Ok(value) => Offset::try_from(value).map_err(|_| LogError::CorruptCounter {
                key: key.clone(),
                value,
            }),
            Err(e) if e.is_not_found() => Ok(Offset::ZERO),
            Err(e) => Err(e.into()),
        }
    }
}
