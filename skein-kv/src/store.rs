//! Key-value store abstraction.
//!
//! Provides the `KvStore` trait the log layer is written against.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::KvResult;

/// Consistency model offered by a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consistency {
    /// Real-time-consistent total order of operations per key.
    Linearizable,
    /// Total order per key, not necessarily real-time-consistent.
    Sequential,
}

impl Consistency {
    /// Returns the well-known service address for this store.
    #[must_use]
    pub const fn service_name(self) -> &'static str {
        match self {
            Self::Linearizable => "lin-kv",
            Self::Sequential => "seq-kv",
        }
    }
}

/// Single-key integer store.
///
/// Every method is a possible suspension point (network I/O). Implementations
/// must be safe to call from many tasks at once.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the consistency model of this store.
    fn consistency(&self) -> Consistency;

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key has never been written.
    async fn read(&self, key: &str) -> KvResult<i64>;

    /// Unconditionally overwrites the value stored under `key`.
    async fn write(&self, key: &str, value: i64) -> KvResult<()>;

    /// Atomically replaces `from` with `to` under `key`.
    ///
    /// When the key is absent and `create_if_missing` is set, the key is
    /// created holding `to`.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` if the current value is not `from`, and
    /// `KeyNotFound` if the key is absent and `create_if_missing` is unset.
    async fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> KvResult<()>;
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn consistency(&self) -> Consistency {
        (**self).consistency()
    }

    async fn read(&self, key: &str) -> KvResult<i64> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: i64) -> KvResult<()> {
        (**self).write(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> KvResult<()> {
        (**self)
            .compare_and_swap(key, from, to, create_if_missing)
            .await
    }
}
