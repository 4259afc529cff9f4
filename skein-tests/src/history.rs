//! Operation history for log verification.
//!
//! Records every client operation with logical invoke/complete times and
//! indexes successful results for the checks in
//! [`verification`](crate::verification).

use std::collections::BTreeMap;

use skein_core::{LogKey, Offset};
use skein_log::Record;

/// Logical time: one tick per recorded event.
pub type Timestamp = u64;

/// Key for indexing by log and offset.
pub type OffsetKey = (LogKey, Offset);

/// A client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// Append a value.
    Send {
        /// Target log.
        key: LogKey,
        /// Appended value.
        value: i64,
    },
    /// Read forward from start offsets.
    Poll {
        /// Start offset per log.
        offsets: BTreeMap<LogKey, Offset>,
    },
    /// Record commit marks.
    Commit {
        /// Commit mark per log.
        offsets: BTreeMap<LogKey, Offset>,
    },
    /// Look up commit marks.
    ListCommitted {
        /// Logs to look up.
        keys: Vec<LogKey>,
    },
}

/// Outcome of a client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The value was appended at `offset`.
    SendOk {
        /// Granted offset.
        offset: Offset,
    },
    /// Records returned by a poll.
    PollOk {
        /// Records per log.
        msgs: BTreeMap<LogKey, Vec<Record>>,
    },
    /// Commit marks recorded.
    CommitOk,
    /// Commit marks returned by a lookup.
    ListOk {
        /// Commit mark per log.
        offsets: BTreeMap<LogKey, Offset>,
    },
    /// The operation failed; it may or may not have taken effect.
    Failed {
        /// Error description.
        error: String,
    },
}

impl OperationResult {
    /// Returns true unless the operation failed.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// A single recorded operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique operation id.
    pub id: u64,
    /// Node that served the operation.
    pub node: u32,
    /// What was requested.
    pub kind: OperationKind,
    /// Invocation time.
    pub invoked_at: Timestamp,
    /// Completion time (filled after execution).
    pub completed_at: Option<Timestamp>,
    /// Outcome (filled after execution).
    pub result: Option<OperationResult>,
}

/// Complete history of a run.
#[derive(Debug, Default)]
pub struct History {
    /// All operations in invocation order.
    operations: Vec<Operation>,

    /// Logical clock.
    clock: Timestamp,

    /// Acknowledged sends by (log, offset): every (`op_id`, value) granted it.
    sends: BTreeMap<OffsetKey, Vec<(u64, i64)>>,

    /// Poll observations by (log, offset): every (`op_id`, value) that saw it.
    observations: BTreeMap<OffsetKey, Vec<(u64, i64)>>,

    /// Completed commits per log as (`op_id`, offset).
    commits: BTreeMap<LogKey, Vec<(u64, Offset)>>,
}

impl History {
    /// Creates a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        self.clock
    }

    /// Records an operation invocation and returns the assigned operation id.
    pub fn record_invoke(&mut self, node: u32, kind: OperationKind) -> u64 {
        let id = self.operations.len() as u64;
        let invoked_at = self.tick();
        self.operations.push(Operation {
            id,
            node,
            kind,
            invoked_at,
            completed_at: None,
            result: None,
        });
        id
    }

    /// Records the completion of an operation.
    ///
    /// # Panics
    ///
    /// Panics if the operation id is invalid or already completed.
    #[allow(clippy::cast_possible_truncation)] // op_id is always within Vec bounds.
    pub fn record_complete(&mut self, op_id: u64, result: OperationResult) {
        let completed_at = self.tick();
        let op = self
            .operations
            .get_mut(op_id as usize)
            .expect("invalid operation ID");
        assert!(op.result.is_none(), "operation {op_id} completed twice");

        match (&op.kind, &result) {
            (OperationKind::Send { key, value }, OperationResult::SendOk { offset }) => {
                self.sends
                    .entry((key.clone(), *offset))
                    .or_default()
                    .push((op_id, *value));
            }
            (OperationKind::Poll { .. }, OperationResult::PollOk { msgs }) => {
                for (key, records) in msgs {
                    for record in records {
                        self.observations
                            .entry((key.clone(), record.offset))
                            .or_default()
                            .push((op_id, record.value));
                    }
                }
            }
            (OperationKind::Commit { offsets }, OperationResult::CommitOk) => {
                for (key, offset) in offsets {
                    self.commits
                        .entry(key.clone())
                        .or_default()
                        .push((op_id, *offset));
                }
            }
            _ => {}
        }

        op.completed_at = Some(completed_at);
        op.result = Some(result);
    }

    /// Returns all operations.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns an operation by id.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_operation(&self, op_id: u64) -> Option<&Operation> {
        self.operations.get(op_id as usize)
    }

    /// Returns all acknowledged sends.
    #[must_use]
    pub const fn sends(&self) -> &BTreeMap<OffsetKey, Vec<(u64, i64)>> {
        &self.sends
    }

    /// Returns all poll observations.
    #[must_use]
    pub const fn observations(&self) -> &BTreeMap<OffsetKey, Vec<(u64, i64)>> {
        &self.observations
    }

    /// Returns all completed commits.
    #[must_use]
    pub const fn commits(&self) -> &BTreeMap<LogKey, Vec<(u64, Offset)>> {
        &self.commits
    }

    /// Returns the number of acknowledged sends.
    #[must_use]
    pub fn acknowledged_sends(&self) -> usize {
        self.sends.values().map(Vec::len).sum()
    }

    /// Returns the number of failed operations.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.result.as_ref().is_some_and(|r| !r.is_ok()))
            .count()
    }

    /// Returns the logs with at least one acknowledged send.
    #[must_use]
    pub fn active_logs(&self) -> Vec<LogKey> {
        let mut keys: Vec<LogKey> = self.sends.keys().map(|(key, _)| key.clone()).collect();
        keys.dedup();
        keys
    }
}
