//! Log configuration.

use std::fmt;
use std::str::FromStr;

use skein_core::Limits;

/// Where commit marks are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitStrategy {
    /// In-process map, visible only to this node.
    ///
    /// Only correct when every commit/list call for a key reaches the same
    /// node.
    Local,
    /// Sequentially-consistent store, visible cluster-wide.
    #[default]
    Store,
}

impl fmt::Display for CommitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Store => f.write_str("store"),
        }
    }
}

impl FromStr for CommitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "store" => Ok(Self::Store),
            other => Err(format!(
                "invalid commit strategy '{other}', expected 'local' or 'store'"
            )),
        }
    }
}

/// Configuration for a [`LogService`](crate::LogService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Maximum compare-and-swap attempts per allocation.
    pub max_cas_attempts: u32,
    /// Maximum records returned per key by one poll (`None` = unbounded).
    pub max_poll_records: Option<u32>,
    /// Maximum size of a log key in bytes.
    pub max_log_key_bytes: u32,
    /// Commit mark backing.
    pub commit_strategy: CommitStrategy,
}

impl LogConfig {
    /// Creates config from system limits.
    #[must_use]
    pub fn from_limits(limits: &Limits) -> Self {
        Self {
            max_cas_attempts: limits.max_cas_attempts,
            max_poll_records: (limits.max_poll_records > 0).then_some(limits.max_poll_records),
            max_log_key_bytes: limits.max_log_key_bytes,
            commit_strategy: CommitStrategy::Store,
        }
    }

    /// Creates config for testing with relaxed limits.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_cas_attempts: 1000,
            max_poll_records: None,
            max_log_key_bytes: 256,
            commit_strategy: CommitStrategy::Store,
        }
    }

    /// Builder: set commit strategy.
    #[must_use]
    pub const fn with_commit_strategy(mut self, strategy: CommitStrategy) -> Self {
        self.commit_strategy = strategy;
        self
    }

    /// Builder: cap records per key returned by one poll.
    #[must_use]
    pub const fn with_max_poll_records(mut self, max: u32) -> Self {
        self.max_poll_records = Some(max);
        self
    }

    /// Builder: set maximum allocation attempts.
    #[must_use]
    pub const fn with_max_cas_attempts(mut self, attempts: u32) -> Self {
        self.max_cas_attempts = attempts;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_limits(&Limits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_limits() {
        let limits = Limits::new();
        let config = LogConfig::from_limits(&limits);

        assert_eq!(config.max_cas_attempts, limits.max_cas_attempts);
        assert_eq!(config.max_log_key_bytes, limits.max_log_key_bytes);
        // Zero limit means no cap.
        assert_eq!(config.max_poll_records, None);
        assert_eq!(config.commit_strategy, CommitStrategy::Store);
    }

    #[test]
    fn test_commit_strategy_parse() {
        assert_eq!("local".parse::<CommitStrategy>(), Ok(CommitStrategy::Local));
        assert_eq!("store".parse::<CommitStrategy>(), Ok(CommitStrategy::Store));
        assert!("memory".parse::<CommitStrategy>().is_err());
        assert_eq!(CommitStrategy::Local.to_string(), "local");
    }
}
