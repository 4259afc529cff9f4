//! Reusable test scenarios for Skein simulation.
//!
//! Scenarios fix cluster shapes, key sets and fault rates so that simulation
//! runs can be composed and reproduced by seed.

/// Standard cluster configurations.
pub mod clusters {
    /// Single node; required for node-local commit tracking.
    pub const ONE_NODE: u32 = 1;

    /// 3-node cluster sharing one pair of stores.
    pub const THREE_NODE: u32 = 3;

    /// 5-node cluster for heavier allocation contention.
    pub const FIVE_NODE: u32 = 5;
}

/// Standard key sets.
pub mod keys {
    /// A handful of logs written by every client.
    pub const SPREAD: &[&str] = &["k1", "k2", "k3", "k4"];

    /// One log written by every client.
    pub const HOT: &[&str] = &["hot"];
}

/// Common fault injection patterns.
pub mod faults {
    /// Read failures on the linearizable store.
    ///
    /// Reads fail before any allocation takes effect, so no offset is burnt.
    #[derive(Debug, Clone, Copy)]
    pub struct FlakyReads {
        /// Probability of a read failing (0.0 - 1.0).
        pub rate: f64,
    }

    impl FlakyReads {
        /// Default read failure rate.
        pub const DEFAULT: Self = Self { rate: 0.05 };
    }

    /// Compare-and-swaps that lose to a phantom writer.
    ///
    /// A conflict may land on a record write and burn an offset.
    #[derive(Debug, Clone, Copy)]
    pub struct PhantomConflicts {
        /// Number of forced conflicts.
        pub count: u32,
    }
}

/// Seeds for reproducible testing.
pub mod seeds {
    /// Standard test seeds that have historically found bugs.
    pub const REGRESSION_SEEDS: &[u64] = &[
        42,
        12345,
        0xDEAD_BEEF,
        999,
        7777,
        0x1337,
        0xCAFE_BABE,
        1,
        u64::MAX,
        0,
    ];

    /// Number of random seeds to test in CI.
    pub const CI_SEED_COUNT: u32 = 50;
}
