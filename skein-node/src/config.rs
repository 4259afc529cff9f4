//! Node configuration.

use std::time::Duration;

use skein_core::Limits;
use skein_log::{CommitStrategy, LogConfig};

/// Configuration for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Deadline for a single key-value service call.
    pub kv_timeout: Duration,
    /// Log service configuration.
    pub log: LogConfig,
}

impl NodeConfig {
    /// Creates config from system limits.
    #[must_use]
    pub fn from_limits(limits: &Limits) -> Self {
        Self {
            kv_timeout: Duration::from_micros(limits.kv_timeout_us),
            log: LogConfig::from_limits(limits),
        }
    }

    /// Creates config for testing.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            kv_timeout: Duration::from_millis(500),
            log: LogConfig::for_testing(),
        }
    }

    /// Builder: set the key-value call deadline.
    #[must_use]
    pub const fn with_kv_timeout(mut self, timeout: Duration) -> Self {
        self.kv_timeout = timeout;
        self
    }

    /// Builder: set the commit strategy.
    #[must_use]
    pub const fn with_commit_strategy(mut self, strategy: CommitStrategy) -> Self {
        self.log.commit_strategy = strategy;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_limits(&Limits::default())
    }
}
