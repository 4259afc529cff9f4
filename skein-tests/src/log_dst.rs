//! Multi-node log simulation tests.
//!
//! Several `LogService` nodes share one linearizable and one sequential
//! `SimulatedKvStore`. Seeded clients issue random sends, polls, commits and
//! lookups against their node; every operation is recorded in a [`History`]
//! and checked by [`Verification`] after a final fault-free poll of every log.
//!
//! # Test Categories
//!
//! 1. **Regression Seeds**: fixed seeds with flaky store reads
//! 2. **Random Seeds**: a wider seed sweep on a 5-node cluster
//! 3. **Hot Key**: every client contends for one log
//! 4. **Local Commits**: node-local commit tracking on a single node
//! 5. **Phantom Conflicts**: forced compare-and-swap conflicts
//! 6. **Determinism**: one seed yields one history

// Test-specific lint allowances - these are less critical in test code.
#![allow(clippy::cast_possible_truncation)] // u32 to usize safe on 64-bit test machines
#![allow(clippy::too_many_lines)] // Test functions can be longer for clarity
#![allow(clippy::significant_drop_tightening)] // Test code clarity > drop optimization
#![allow(clippy::unreadable_literal)] // Large seed numbers are fine without separators

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skein_core::{LogKey, Offset};
use skein_kv::{Consistency, KvFaultConfig, KvOpCounts, SimulatedKvStore};
use skein_log::{CommitStrategy, LogConfig, LogService};

use crate::history::{History, OperationKind, OperationResult};
use crate::scenarios::{clusters, faults, keys, seeds};
use crate::verification::{Verification, Violation};

// ============================================================================
// Simulation Harness
// ============================================================================

#[derive(Debug, Clone)]
struct SimConfig {
    seed: u64,
    nodes: u32,
    clients: u32,
    ops_per_client: u32,
    keys: &'static [&'static str],
    read_fail_rate: f64,
    cas_conflicts: u32,
    commit_strategy: CommitStrategy,
}

impl SimConfig {
    fn new(seed: u64) -> Self {
        Self {
            seed,
            nodes: clusters::THREE_NODE,
            clients: 6,
            ops_per_client: 40,
            keys: keys::SPREAD,
            read_fail_rate: faults::FlakyReads::DEFAULT.rate,
            cas_conflicts: 0,
            commit_strategy: CommitStrategy::Store,
        }
    }

    const fn with_nodes(mut self, nodes: u32) -> Self {
        self.nodes = nodes;
        self
    }

    const fn with_clients(mut self, clients: u32) -> Self {
        self.clients = clients;
        self
    }

    const fn with_keys(mut self, keys: &'static [&'static str]) -> Self {
        self.keys = keys;
        self
    }

    fn with_read_fail_rate(mut self, rate: f64) -> Self {
        self.read_fail_rate = rate;
        self
    }

    const fn with_cas_conflicts(mut self, conflicts: faults::PhantomConflicts) -> Self {
        self.cas_conflicts = conflicts.count;
        self
    }

    const fn with_commit_strategy(mut self, strategy: CommitStrategy) -> Self {
        self.commit_strategy = strategy;
        self
    }
}

struct Simulation {
    lin: SimulatedKvStore,
    services: Vec<LogService>,
    history: Mutex<History>,
}

impl Simulation {
    fn new(config: &SimConfig) -> Self {
        let lin = SimulatedKvStore::with_faults(
            Consistency::Linearizable,
            config.seed,
            KvFaultConfig::none().with_read_fail_rate(config.read_fail_rate),
        );
        lin.fault_config().force_cas_conflicts = config.cas_conflicts;
        let seq = SimulatedKvStore::sequential(config.seed.wrapping_add(1));

        let services = (0..config.nodes)
            .map(|_| {
                LogService::new(
                    Arc::new(lin.clone()),
                    Arc::new(seq.clone()),
                    LogConfig::for_testing().with_commit_strategy(config.commit_strategy),
                )
            })
            .collect();

        Self {
            lin,
            services,
            history: Mutex::new(History::new()),
        }
    }

    /// Runs one operation on `node` and records it.
    async fn execute(&self, node: u32, kind: OperationKind) -> OperationResult {
        let op_id = self
            .history
            .lock()
            .expect("history lock poisoned")
            .record_invoke(node, kind.clone());

        let service = &self.services[node as usize];
        let result = match &kind {
            OperationKind::Send { key, value } => service
                .send(key, *value)
                .await
                .map(|offset| OperationResult::SendOk { offset }),
            OperationKind::Poll { offsets } => service
                .poll(offsets)
                .await
                .map(|msgs| OperationResult::PollOk { msgs }),
            OperationKind::Commit { offsets } => service
                .commit_offsets(offsets)
                .await
                .map(|()| OperationResult::CommitOk),
            OperationKind::ListCommitted { keys } => service
                .list_committed_offsets(keys)
                .await
                .map(|offsets| OperationResult::ListOk { offsets }),
        }
        .unwrap_or_else(|e| OperationResult::Failed {
            error: e.to_string(),
        });

        self.history
            .lock()
            .expect("history lock poisoned")
            .record_complete(op_id, result.clone());
        result
    }

    async fn run_client(&self, config: &SimConfig, client: u32) {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(u64::from(client)));
        let node = client % config.nodes;
        let all_keys: Vec<LogKey> = config.keys.iter().map(|k| LogKey::from(*k)).collect();

        for _ in 0..config.ops_per_client {
            let key = all_keys[rng.gen_range(0..all_keys.len())].clone();
            let kind = match rng.gen_range(0..10) {
                0..=4 => OperationKind::Send {
                    key,
                    value: rng.gen_range(-1000..1000),
                },
                5 | 6 => OperationKind::Poll {
                    offsets: BTreeMap::from([(key, Offset::new(rng.gen_range(0..4)))]),
                },
                7 | 8 => OperationKind::Commit {
                    offsets: BTreeMap::from([(key, Offset::new(rng.gen_range(1..4)))]),
                },
                _ => OperationKind::ListCommitted {
                    keys: all_keys.clone(),
                },
            };
            self.execute(node, kind).await;
        }
    }

    /// Polls every written log from the start with faults cleared.
    async fn final_poll(&self) {
        *self.lin.fault_config() = KvFaultConfig::none();

        let logs = self
            .history
            .lock()
            .expect("history lock poisoned")
            .active_logs();
        if logs.is_empty() {
            return;
        }

        let offsets = logs.into_iter().map(|key| (key, Offset::new(1))).collect();
        let result = self.execute(0, OperationKind::Poll { offsets }).await;
        assert!(result.is_ok(), "final poll failed: {result:?}");
    }
}

/// Runs a full simulation and returns its history and the linearizable
/// store's operation counts.
async fn run_simulation(config: &SimConfig) -> (History, KvOpCounts) {
    let sim = Simulation::new(config);

    join_all((0..config.clients).map(|client| sim.run_client(config, client))).await;
    sim.final_poll().await;

    let history = std::mem::take(&mut *sim.history.lock().expect("history lock poisoned"));
    (history, sim.lin.op_counts())
}

fn assert_no_violations(seed: u64, violations: &[Violation]) {
    assert!(
        violations.is_empty(),
        "Seed {seed}: {} violations:\n{}",
        violations.len(),
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn invoked_sends(history: &History) -> usize {
    history
        .operations()
        .iter()
        .filter(|op| matches!(op.kind, OperationKind::Send { .. }))
        .count()
}

// ============================================================================
// DST Tests
// ============================================================================

#[tokio::test]
async fn test_dst_log_regression_seeds() {
    for &seed in seeds::REGRESSION_SEEDS {
        let (history, _) = run_simulation(&SimConfig::new(seed)).await;

        assert!(
            history.acknowledged_sends() > 0,
            "Seed {seed}: no send succeeded"
        );
        assert_no_violations(seed, &Verification::verify(&history));
    }
}

#[tokio::test]
async fn test_dst_log_random_seeds() {
    let mut total_failures = 0;

    for i in 0..u64::from(seeds::CI_SEED_COUNT) {
        let seed = i.wrapping_mul(0x9E37_79B9).wrapping_add(17);
        let config = SimConfig::new(seed).with_nodes(clusters::FIVE_NODE);
        let (history, _) = run_simulation(&config).await;

        total_failures += history.failures();
        assert_no_violations(seed, &Verification::verify(&history));
    }

    // 5% read faults over thousands of operations.
    assert!(total_failures > 0, "fault injection never fired");
}

#[tokio::test]
async fn test_dst_log_hot_key_contention() {
    for &seed in &seeds::REGRESSION_SEEDS[..4] {
        let config = SimConfig::new(seed)
            .with_nodes(clusters::FIVE_NODE)
            .with_clients(10)
            .with_keys(keys::HOT)
            .with_read_fail_rate(0.0);
        let (history, counts) = run_simulation(&config).await;

        // Without faults every send lands, so offsets are exactly 1..=n.
        assert_eq!(history.acknowledged_sends(), invoked_sends(&history));
        assert_no_violations(seed, &Verification::verify(&history));
        assert!(counts.cas_conflicts > 0, "Seed {seed}: no allocation race");
    }
}

#[tokio::test]
async fn test_dst_log_local_commits_single_node() {
    for &seed in seeds::REGRESSION_SEEDS {
        let config = SimConfig::new(seed)
            .with_nodes(clusters::ONE_NODE)
            .with_clients(4)
            .with_commit_strategy(CommitStrategy::Local);
        let (history, _) = run_simulation(&config).await;

        assert_no_violations(seed, &Verification::verify(&history));
    }
}

#[tokio::test]
async fn test_dst_log_phantom_conflicts() {
    let conflicts = faults::PhantomConflicts { count: 25 };

    for &seed in seeds::REGRESSION_SEEDS {
        let config = SimConfig::new(seed)
            .with_read_fail_rate(0.0)
            .with_cas_conflicts(conflicts);
        let (history, counts) = run_simulation(&config).await;

        assert!(counts.cas_conflicts >= u64::from(conflicts.count));

        // A conflict on a record write burns its offset and ends polls there,
        // so only the checks that tolerate burnt offsets apply.
        let mut violations = Verification::check_duplicates(&history);
        violations.extend(Verification::check_inconsistent_reads(&history));
        violations.extend(Verification::check_poll_contiguity(&history));
        violations.extend(Verification::check_commits(&history));
        assert_no_violations(seed, &violations);
    }
}

#[tokio::test]
async fn test_dst_log_same_seed_same_history() {
    let config = SimConfig::new(0xCAFE_BABE);

    let (first, _) = run_simulation(&config).await;
    let (second, _) = run_simulation(&config).await;

    let outline = |history: &History| {
        history
            .operations()
            .iter()
            .map(|op| (op.node, op.kind.clone(), op.result.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(outline(&first), outline(&second));
}
