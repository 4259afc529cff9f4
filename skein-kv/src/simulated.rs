//! In-memory simulated key-value store.
//!
//! Provides `SimulatedKvStore` for deterministic simulation testing, with
//! seeded fault injection and per-operation counters.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::trace;

use crate::error::{KvError, KvResult};
use crate::store::{Consistency, KvStore};

// -----------------------------------------------------------------------------
// Fault Configuration
// -----------------------------------------------------------------------------

/// Fault configuration for the simulated store.
#[derive(Debug, Clone, Default)]
pub struct KvFaultConfig {
    /// Probability of read operations failing (0.0 - 1.0).
    pub read_fail_rate: f64,
    /// Probability of write operations failing (0.0 - 1.0).
    pub write_fail_rate: f64,
    /// Probability of compare-and-swap operations failing (0.0 - 1.0).
    pub cas_fail_rate: f64,
    /// Force next read to fail (one-shot).
    pub force_read_fail: bool,
    /// Force next write to fail (one-shot).
    pub force_write_fail: bool,
    /// Force next compare-and-swap to fail (one-shot).
    pub force_cas_fail: bool,
    /// Number of upcoming compare-and-swaps that lose to a phantom writer.
    pub force_cas_conflicts: u32,
}

impl KvFaultConfig {
    /// No faults (all operations succeed).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            read_fail_rate: 0.0,
            write_fail_rate: 0.0,
            cas_fail_rate: 0.0,
            force_read_fail: false,
            force_write_fail: false,
            force_cas_fail: false,
            force_cas_conflicts: 0,
        }
    }

    /// Flaky configuration for stress testing.
    #[must_use]
    pub const fn flaky() -> Self {
        Self {
            read_fail_rate: 0.05,
            write_fail_rate: 0.05,
            cas_fail_rate: 0.05,
            force_read_fail: false,
            force_write_fail: false,
            force_cas_fail: false,
            force_cas_conflicts: 0,
        }
    }

    /// Builder: set read fail rate.
    #[must_use]
    pub const fn with_read_fail_rate(mut self, rate: f64) -> Self {
        self.read_fail_rate = rate;
        self
    }

    /// Builder: set write fail rate.
    #[must_use]
    pub const fn with_write_fail_rate(mut self, rate: f64) -> Self {
        self.write_fail_rate = rate;
        self
    }

    /// Builder: set compare-and-swap fail rate.
    #[must_use]
    pub const fn with_cas_fail_rate(mut self, rate: f64) -> Self {
        self.cas_fail_rate = rate;
        self
    }
}

// -----------------------------------------------------------------------------
// Operation Counters
// -----------------------------------------------------------------------------

/// Snapshot of operations served by a simulated store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KvOpCounts {
    /// Read calls, including failed ones.
    pub reads: u64,
    /// Write calls, including failed ones.
    pub writes: u64,
    /// Compare-and-swap calls, including failed ones.
    pub cas: u64,
    /// Compare-and-swap calls rejected with `PreconditionFailed`.
    pub cas_conflicts: u64,
}

#[derive(Debug, Default)]
struct OpCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    cas: AtomicU64,
    cas_conflicts: AtomicU64,
}

// -----------------------------------------------------------------------------
// Simulated Store
// -----------------------------------------------------------------------------

/// In-memory simulated key-value store for DST.
///
/// Clones share state via `Arc`, so several simulated nodes can hold handles
/// to the same store. Each operation is applied atomically under one lock,
/// which gives linearizable behavior; it therefore also satisfies the weaker
/// sequential contract.
#[derive(Debug, Clone)]
pub struct SimulatedKvStore {
    /// Stored values.
    data: Arc<Mutex<HashMap<String, i64>>>,
    /// Consistency model this instance reports.
    consistency: Consistency,
    /// Fault configuration.
    fault_config: Arc<Mutex<KvFaultConfig>>,
    /// RNG seed for deterministic faults.
    seed: u64,
    /// Operation counter for deterministic RNG.
    counter: Arc<AtomicU64>,
    /// Per-operation statistics.
    ops: Arc<OpCounters>,
}

impl SimulatedKvStore {
    /// Creates a new simulated store with no faults.
    #[must_use]
    pub fn new(consistency: Consistency, seed: u64) -> Self {
        Self::with_faults(consistency, seed, KvFaultConfig::none())
    }

    /// Creates a simulated store with fault injection.
    #[must_use]
    pub fn with_faults(consistency: Consistency, seed: u64, config: KvFaultConfig) -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            consistency,
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            counter: Arc::new(AtomicU64::new(0)),
            ops: Arc::new(OpCounters::default()),
        }
    }

    /// Creates a fault-free linearizable store.
    #[must_use]
    pub fn linearizable(seed: u64) -> Self {
        Self::new(Consistency::Linearizable, seed)
    }

    /// Creates a fault-free sequentially-consistent store.
    #[must_use]
    pub fn sequential(seed: u64) -> Self {
        Self::new(Consistency::Sequential, seed)
    }

    /// Returns fault config for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, KvFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Returns a snapshot of the operation counters.
    #[must_use]
    pub fn op_counts(&self) -> KvOpCounts {
        KvOpCounts {
            reads: self.ops.reads.load(Ordering::Relaxed),
            writes: self.ops.writes.load(Ordering::Relaxed),
            cas: self.ops.cas.load(Ordering::Relaxed),
            cas_conflicts: self.ops.cas_conflicts.load(Ordering::Relaxed),
        }
    }

    /// Returns the stored value (bypasses faults, for assertions in tests).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<i64> {
        let data = self.data.lock().expect("data lock poisoned");
        data.get(key).copied()
    }

    /// Returns all keys starting with `prefix` (bypasses faults).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let data = self.data.lock().expect("data lock poisoned");
        let mut keys: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Deterministic RNG.
    ///
    /// Uses `(seed + counter) * M` formula for reproducible fault injection.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let hash = self
            .seed
            .wrapping_add(counter)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    /// Checks forced and probabilistic faults for one operation.
    fn check_fault(
        &self,
        operation: &'static str,
        take_forced: impl FnOnce(&mut KvFaultConfig) -> bool,
        rate: impl FnOnce(&KvFaultConfig) -> f64,
    ) -> KvResult<()> {
        let rate = {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            if take_forced(&mut *config) {
                return Err(KvError::Unavailable {
                    operation,
                    message: "simulated failure (forced)".into(),
                });
            }
            rate(&*config)
        };

        if self.should_inject_fault(rate) {
            return Err(KvError::Unavailable {
                operation,
                message: "simulated failure (random)".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for SimulatedKvStore {
    fn consistency(&self) -> Consistency {
        self.consistency
    }

    async fn read(&self, key: &str) -> KvResult<i64> {
        // Every store call is a suspension point.
        tokio::task::yield_now().await;
        self.ops.reads.fetch_add(1, Ordering::Relaxed);

        self.check_fault(
            "read",
            |c| std::mem::take(&mut c.force_read_fail),
            |c| c.read_fail_rate,
        )?;

        let data = self.data.lock().expect("data lock poisoned");
        data.get(key).copied().ok_or_else(|| KvError::KeyNotFound {
            key: key.to_string(),
        })
    }

    async fn write(&self, key: &str, value: i64) -> KvResult<()> {
        tokio::task::yield_now().await;
        self.ops.writes.fetch_add(1, Ordering::Relaxed);

        self.check_fault(
            "write",
            |c| std::mem::take(&mut c.force_write_fail),
            |c| c.write_fail_rate,
        )?;

        let mut data = self.data.lock().expect("data lock poisoned");
        data.insert(key.to_string(), value);
        trace!(key, value, "simulated write");
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> KvResult<()> {
        tokio::task::yield_now().await;
        self.ops.cas.fetch_add(1, Ordering::Relaxed);

        self.check_fault(
            "cas",
            |c| std::mem::take(&mut c.force_cas_fail),
            |c| c.cas_fail_rate,
        )?;

        {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            if config.force_cas_conflicts > 0 {
                config.force_cas_conflicts -= 1;
                self.ops.cas_conflicts.fetch_add(1, Ordering::Relaxed);
                return Err(KvError::PreconditionFailed {
                    key: key.to_string(),
                    message: "simulated conflict (forced)".into(),
                });
            }
        }

        let mut data = self.data.lock().expect("data lock poisoned");
        match data.get(key).copied() {
            Some(current) if current == from => {
                data.insert(key.to_string(), to);
                trace!(key, from, to, "simulated cas");
                Ok(())
            }
            Some(current) => {
                self.ops.cas_conflicts.fetch_add(1, Ordering::Relaxed);
                Err(KvError::PreconditionFailed {
                    key: key.to_string(),
                    message: format!("expected {from}, but had {current}"),
                })
            }
            None if create_if_missing => {
                data.insert(key.to_string(), to);
                trace!(key, to, "simulated cas created key");
                Ok(())
            }
            None => Err(KvError::KeyNotFound {
                key: key.to_string(),
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
