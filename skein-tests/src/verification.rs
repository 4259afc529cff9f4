//! Verification logic for detecting log correctness violations.
//!
//! Checks a [`History`] for:
//! - Lost writes (acknowledged but never observed)
//! - Inconsistent reads (an offset observed with a value other than the one sent)
//! - Duplicate offsets (one offset granted to several sends)
//! - Offset gaps (acknowledged offsets of a log not forming 1..=n)
//! - Non-contiguous polls (a poll result that is not a run from its start)
//! - Phantom commits (a listed mark nobody committed)
//! - Missing commits (a completed commit absent from a later list)
//!
//! The gap check assumes no offset was burnt by a failed record write.

use std::fmt;

use skein_core::{LogKey, Offset};

use crate::history::{History, OperationKind, OperationResult};

/// A violation of an expected property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// An acknowledged send was never observed in any poll.
    LostWrite {
        /// Operation id of the send.
        op_id: u64,
        /// Log.
        key: LogKey,
        /// Granted offset.
        offset: Offset,
        /// Value sent.
        value: i64,
    },

    /// A poll observed a value other than the one sent at that offset.
    InconsistentRead {
        /// Log.
        key: LogKey,
        /// Offset.
        offset: Offset,
        /// Value sent.
        expected: i64,
        /// Value observed.
        observed: i64,
        /// Operation id of the send.
        send_op_id: u64,
        /// Operation id of the poll.
        poll_op_id: u64,
    },

    /// The same offset was granted to several sends.
    DuplicateOffset {
        /// Log.
        key: LogKey,
        /// The duplicated offset.
        offset: Offset,
        /// Operation ids of the sends.
        op_ids: Vec<u64>,
    },

    /// Acknowledged offsets skip a value.
    OffsetGap {
        /// Log.
        key: LogKey,
        /// Next offset expected.
        expected_offset: Offset,
        /// Offset found instead.
        actual_offset: Offset,
    },

    /// A poll returned offsets that are not a contiguous run from its start.
    NonContiguousPoll {
        /// Log.
        key: LogKey,
        /// Operation id of the poll.
        poll_op_id: u64,
        /// Requested start offset.
        start: Offset,
        /// Offsets returned.
        offsets: Vec<u64>,
    },

    /// A list returned a mark that no commit on that log ever carried.
    PhantomCommit {
        /// Log.
        key: LogKey,
        /// Listed offset.
        offset: Offset,
        /// Operation id of the list.
        list_op_id: u64,
    },

    /// A list omitted a log whose commit completed before the list began.
    MissingCommit {
        /// Log.
        key: LogKey,
        /// Operation id of the completed commit.
        commit_op_id: u64,
        /// Operation id of the list.
        list_op_id: u64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LostWrite {
                op_id,
                key,
                offset,
                value,
            } => write!(
                f,
                "Lost write: op={op_id} {key}@{offset}={value} was acknowledged but never observed"
            ),
            Self::InconsistentRead {
                key,
                offset,
                expected,
                observed,
                send_op_id,
                poll_op_id,
            } => write!(
                f,
                "Inconsistent read: {key}@{offset} sent {expected} by op={send_op_id}, \
                 observed {observed} by op={poll_op_id}"
            ),
            Self::DuplicateOffset {
                key,
                offset,
                op_ids,
            } => write!(
                f,
                "Duplicate offset: {key}@{offset} granted to ops {op_ids:?}"
            ),
            Self::OffsetGap {
                key,
                expected_offset,
                actual_offset,
            } => write!(
                f,
                "Offset gap: {key} expected {expected_offset}, found {actual_offset}"
            ),
            Self::NonContiguousPoll {
                key,
                poll_op_id,
                start,
                offsets,
            } => write!(
                f,
                "Non-contiguous poll: op={poll_op_id} {key} from {start} returned {offsets:?}"
            ),
            Self::PhantomCommit {
                key,
                offset,
                list_op_id,
            } => write!(
                f,
                "Phantom commit: op={list_op_id} listed {key}@{offset}, which was never committed"
            ),
            Self::MissingCommit {
                key,
                commit_op_id,
                list_op_id,
            } => write!(
                f,
                "Missing commit: op={list_op_id} omitted {key} committed by op={commit_op_id}"
            ),
        }
    }
}

/// Verification runner that checks all properties.
pub struct Verification;

impl Verification {
    /// Runs all verification checks against a history.
    #[must_use]
    pub fn verify(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();

        violations.extend(Self::check_lost_writes(history));
        violations.extend(Self::check_inconsistent_reads(history));
        violations.extend(Self::check_duplicates(history));
        violations.extend(Self::check_offset_gaps(history));
        violations.extend(Self::check_poll_contiguity(history));
        violations.extend(Self::check_commits(history));

        violations
    }

    /// Checks that every acknowledged send was observed by some poll.
    ///
    /// Only meaningful once the history ends with a full poll of every log.
    #[must_use]
    pub fn check_lost_writes(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();

        for ((key, offset), sends) in history.sends() {
            let observed = history.observations().get(&(key.clone(), *offset));
            if observed.map_or(true, Vec::is_empty) {
                for (op_id, value) in sends {
                    violations.push(Violation::LostWrite {
                        op_id: *op_id,
                        key: key.clone(),
                        offset: *offset,
                        value: *value,
                    });
                }
            }
        }

        violations
    }

    /// Checks that polls only observe the value sent at each offset.
    #[must_use]
    pub fn check_inconsistent_reads(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();

        for ((key, offset), sends) in history.sends() {
            let Some(observations) = history.observations().get(&(key.clone(), *offset)) else {
                continue;
            };
            let (send_op_id, expected) = sends[0];

            for (poll_op_id, observed) in observations {
                if *observed != expected {
                    violations.push(Violation::InconsistentRead {
                        key: key.clone(),
                        offset: *offset,
                        expected,
                        observed: *observed,
                        send_op_id,
                        poll_op_id: *poll_op_id,
                    });
                }
            }
        }

        violations
    }

    /// Checks that no offset was granted twice.
    #[must_use]
    pub fn check_duplicates(history: &History) -> Vec<Violation> {
        history
            .sends()
            .iter()
            .filter(|(_, sends)| sends.len() > 1)
            .map(|((key, offset), sends)| Violation::DuplicateOffset {
                key: key.clone(),
                offset: *offset,
                op_ids: sends.iter().map(|(op_id, _)| *op_id).collect(),
            })
            .collect()
    }

    /// Checks that the acknowledged offsets of each log are exactly 1..=n.
    #[must_use]
    pub fn check_offset_gaps(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();

        for key in history.active_logs() {
            // BTreeMap order: offsets of one log are adjacent and ascending.
            let offsets = history
                .sends()
                .keys()
                .filter(|(k, _)| *k == key)
                .map(|(_, offset)| *offset);

            let mut expected = Offset::new(1);
            for offset in offsets {
                if offset != expected {
                    violations.push(Violation::OffsetGap {
                        key: key.clone(),
                        expected_offset: expected,
                        actual_offset: offset,
                    });
                }
                expected = offset.next();
            }
        }

        violations
    }

    /// Checks that each polled run starts at its requested offset (or 1 for
    /// a zero start) and has no holes.
    #[must_use]
    pub fn check_poll_contiguity(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();

        for op in history.operations() {
            let (OperationKind::Poll { offsets: starts }, Some(OperationResult::PollOk { msgs })) =
                (&op.kind, &op.result)
            else {
                continue;
            };

            for (key, records) in msgs {
                let start = starts.get(key).copied().unwrap_or(Offset::ZERO);
                let first = if start.is_record() { start } else { start.next() };

                let contiguous = records
                    .iter()
                    .enumerate()
                    .all(|(i, record)| record.offset.get() == first.get() + i as u64);

                if !contiguous {
                    violations.push(Violation::NonContiguousPoll {
                        key: key.clone(),
                        poll_op_id: op.id,
                        start,
                        offsets: records.iter().map(|r| r.offset.get()).collect(),
                    });
                }
            }
        }

        violations
    }

    /// Checks listed commit marks against completed commits.
    #[must_use]
    pub fn check_commits(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();

        for op in history.operations() {
            let (OperationKind::ListCommitted { keys }, Some(OperationResult::ListOk { offsets })) =
                (&op.kind, &op.result)
            else {
                continue;
            };

            for key in keys {
                let commits = history.commits().get(key).map_or(&[][..], Vec::as_slice);

                match offsets.get(key) {
                    Some(listed) => {
                        // Any commit invoked before the list finished may be visible.
                        let possible = history.operations().iter().any(|c| {
                            c.invoked_at < op.completed_at.unwrap_or(u64::MAX)
                                && matches!(&c.kind, OperationKind::Commit { offsets } if offsets.get(key) == Some(listed))
                        });
                        if !possible {
                            violations.push(Violation::PhantomCommit {
                                key: key.clone(),
                                offset: *listed,
                                list_op_id: op.id,
                            });
                        }
                    }
                    None => {
                        let earlier = commits.iter().find(|(commit_op_id, _)| {
                            history
                                .get_operation(*commit_op_id)
                                .and_then(|c| c.completed_at)
                                .is_some_and(|done| done < op.invoked_at)
                        });
                        if let Some((commit_op_id, _)) = earlier {
                            violations.push(Violation::MissingCommit {
                                key: key.clone(),
                                commit_op_id: *commit_op_id,
                                list_op_id: op.id,
                            });
                        }
                    }
                }
            }
        }

        violations
    }
}
