//! Polling.
//!
//! A poll walks each requested log forward from its start offset, one record
//! read at a time, and stops at the first offset with no record. Offsets are
//! allocated without gaps, so under normal operation this returns every
//! record present from the start offset onward. An offset that was allocated
//! but never written (the append failed) ends the scan there.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use skein_core::{LogKey, Offset};
use skein_kv::KvStore;
use tracing::debug;

use crate::error::LogResult;
use crate::record::{LogStore, Record};

/// Returns contiguous runs of records.
#[derive(Debug, Clone)]
pub struct PollEngine<S> {
    log: LogStore<S>,
    /// Cap on records per key (`None` = unbounded).
    max_records: Option<u32>,
}

impl<S: KvStore> PollEngine<S> {
    /// Creates a poll engine reading through `log`.
    #[must_use]
    pub const fn new(log: LogStore<S>, max_records: Option<u32>) -> Self {
        Self { log, max_records }
    }

    /// Polls every requested log from its start offset.
    ///
    /// Every requested key appears in the result, with an empty run if there
    /// is nothing at or after its start offset. The call is all-or-nothing: a
    /// store failure on any key fails the whole poll.
    ///
    /// # Errors
    ///
    /// Returns the first store error encountered.
    pub async fn poll(
        &self,
        requests: &BTreeMap<LogKey, Offset>,
    ) -> LogResult<BTreeMap<LogKey, Vec<Record>>> {
        let scans = requests.iter().map(|(key, start)| async move {
            let records = self.scan(key, *start).await?;
            Ok::<_, crate::LogError>((key.clone(), records))
        });

        let results = try_join_all(scans).await?;
        Ok(results.into_iter().collect())
    }

    /// Reads the contiguous run of records of `key` starting at `start`.
    ///
    /// Offset zero never holds a record, so a scan from zero begins at one.
    ///
    /// # Errors
    ///
    /// Returns the store error if a read fails.
    pub async fn scan(&self, key: &LogKey, start: Offset) -> LogResult<Vec<Record>> {
        let mut records = Vec::new();
        let mut current = if start.is_record() { start } else { start.next() };

        loop {
            if self
                .max_records
                .is_some_and(|max| records.len() >= max as usize)
            {
                break;
            }

            match self.log.read_at(key, current).await? {
                Some(record) => {
                    records.push(record);
                    current = current.next();
                }
                None => break,
            }
        }

        debug!(key = %key, start = %start, count = records.len(), "Scanned log");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use skein_kv::SimulatedKvStore;

    use super::*;

    async fn seeded_log(values: &[(u64, i64)]) -> (SimulatedKvStore, LogStore<SimulatedKvStore>) {
        let store = SimulatedKvStore::linearizable(42);
        let log = LogStore::new(store.clone());
        for (offset, value) in values {
            log.append(&"k1".into(), Offset::new(*offset), *value)
                .await
                .unwrap();
        }
        (store, log)
    }

    fn request(entries: &[(&str, u64)]) -> BTreeMap<LogKey, Offset> {
        entries
            .iter()
            .map(|(k, o)| (LogKey::from(*k), Offset::new(*o)))
            .collect()
    }

    #[tokio::test]
    async fn test_poll_returns_contiguous_run() {
        let (_, log) = seeded_log(&[(1, 9), (2, 5), (3, 15)]).await;
        let engine = PollEngine::new(log, None);

        let result = engine.poll(&request(&[("k1", 2)])).await.unwrap();
        assert_eq!(
            result[&LogKey::from("k1")],
            vec![
                Record::new(Offset::new(2), 5),
                Record::new(Offset::new(3), 15)
            ]
        );
    }

    #[tokio::test]
    async fn test_poll_stops_at_first_gap() {
        let (_, log) = seeded_log(&[(1, 9), (2, 5), (4, 7)]).await;
        let engine = PollEngine::new(log, None);

        let records = engine.scan(&"k1".into(), Offset::new(1)).await.unwrap();
        let offsets: Vec<u64> = records.iter().map(|r| r.offset.get()).collect();
        assert_eq!(offsets, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_poll_past_end_is_empty() {
        let (_, log) = seeded_log(&[(1, 9), (2, 5)]).await;
        let engine = PollEngine::new(log, None);

        let result = engine
            .poll(&request(&[("k1", 5), ("unknown", 1)]))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[&LogKey::from("k1")].is_empty());
        assert!(result[&LogKey::from("unknown")].is_empty());
    }

    #[tokio::test]
    async fn test_poll_from_zero_starts_at_first_record() {
        let (_, log) = seeded_log(&[(1, 9), (2, 5)]).await;
        let engine = PollEngine::new(log, None);

        let records = engine.scan(&"k1".into(), Offset::ZERO).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, Offset::new(1));
    }

    #[tokio::test]
    async fn test_poll_cap_truncates_without_skipping() {
        let (_, log) = seeded_log(&[(1, 1), (2, 2), (3, 3), (4, 4)]).await;
        let engine = PollEngine::new(log, Some(2));

        let first = engine.scan(&"k1".into(), Offset::new(1)).await.unwrap();
        assert_eq!(
            first,
            vec![Record::new(Offset::new(1), 1), Record::new(Offset::new(2), 2)]
        );

        let second = engine.scan(&"k1".into(), Offset::new(3)).await.unwrap();
        assert_eq!(
            second,
            vec![Record::new(Offset::new(3), 3), Record::new(Offset::new(4), 4)]
        );
    }

    #[tokio::test]
    async fn test_poll_is_all_or_nothing() {
        let (store, log) = seeded_log(&[(1, 9)]).await;
        let engine = PollEngine::new(log, None);

        store.fault_config().force_read_fail = true;
        let result = engine.poll(&request(&[("k1", 1), ("k2", 1)])).await;
        assert!(result.is_err());
    }
}
