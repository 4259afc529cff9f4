//! System limits and configuration bounds.
//!
//! Put limits on everything: every retry loop, scan and wait has an explicit
//! maximum. This keeps a misbehaving store from stalling a request forever.

/// System-wide limits for Skein.
///
/// All limits are explicit and configurable. Default values are chosen to be
/// safe for the linearizable/sequential stores a node normally talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    // Allocation limits.
    /// Maximum compare-and-swap attempts per offset allocation.
    pub max_cas_attempts: u32,

    // Read limits.
    /// Maximum records returned per key by a single poll. Zero means unbounded.
    pub max_poll_records: u32,

    // Key limits.
    /// Maximum size of a log key in bytes.
    pub max_log_key_bytes: u32,

    // Timeout limits (in microseconds).
    /// Deadline for a single key-value store call.
    pub kv_timeout_us: u64,
    /// Maximum allowed store call deadline.
    pub max_kv_timeout_us: u64,
}

impl Limits {
    /// Creates limits with safe defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // Allocation: 100 CAS attempts before giving up.
            max_cas_attempts: 100,

            // Reads: no cap, matching unbounded poll semantics.
            max_poll_records: 0,

            // Keys: 1KB.
            max_log_key_bytes: 1024,

            // Timeouts: 1s per store call, 60s max.
            kv_timeout_us: 1_000_000,
            max_kv_timeout_us: 60 * 1_000_000,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns an error if any limits are invalid or inconsistent.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_cas_attempts == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_cas_attempts",
                reason: "must be positive",
            });
        }

        if self.max_log_key_bytes == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_log_key_bytes",
                reason: "must be positive",
            });
        }

        if self.kv_timeout_us == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "kv_timeout_us",
                reason: "must be positive",
            });
        }

        if self.kv_timeout_us > self.max_kv_timeout_us {
            return Err(crate::Error::InvalidArgument {
                name: "kv_timeout_us",
                reason: "must be <= max_kv_timeout_us",
            });
        }

        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}
