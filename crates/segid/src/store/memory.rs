use std::collections::HashMap;

use portable_atomic::{AtomicBool, Ordering};

use crate::{
    error::StoreError,
    mutex::{Mutex, lock},
    store::RangeStore,
};

/// A process-local [`RangeStore`] backed by a mutex-guarded map.
///
/// Counters live only as long as the store does, so IDs are unique within one
/// process lifetime only. Use it for tests, benchmarks and single-node
/// development; production deployments want a shared durable store such as
/// `MongoRangeStore`.
///
/// # Example
///
/// ```
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// use segid::{MemoryRangeStore, RangeStore};
///
/// let store = MemoryRangeStore::new();
/// assert_eq!(store.increment_and_fetch("orders", 1000).await, Ok(1000));
/// assert_eq!(store.increment_and_fetch("orders", 1000).await, Ok(2000));
/// assert_eq!(store.increment_and_fetch("users", 1000).await, Ok(1000));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryRangeStore {
    counters: Mutex<HashMap<String, i64>>,
    closed: AtomicBool,
}

impl MemoryRangeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `tag` with `value`, as if earlier ranges up to `value` had
    /// already been allocated.
    #[must_use]
    pub fn with_counter(self, tag: impl Into<String>, value: i64) -> Self {
        lock(&self.counters).insert(tag.into(), value);
        self
    }

    /// Returns the current counter for `tag`, if the record exists.
    pub fn counter(&self, tag: &str) -> Option<i64> {
        lock(&self.counters).get(tag).copied()
    }

    /// Returns `true` once [`RangeStore::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl RangeStore for MemoryRangeStore {
    async fn increment_and_fetch(&self, tag: &str, step: i64) -> Result<i64, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Unavailable {
                reason: "store is closed".to_string(),
            });
        }

        let mut counters = lock(&self.counters);
        let counter = counters.entry(tag.to_string()).or_insert(0);
        *counter = counter
            .checked_add(step)
            .ok_or_else(|| StoreError::Malformed {
                reason: format!("counter for `{tag}` would overflow"),
            })?;
        Ok(*counter)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upserts_from_zero_and_accumulates() {
        let store = MemoryRangeStore::new();
        assert_eq!(store.counter("t"), None);
        assert_eq!(store.increment_and_fetch("t", 1000).await, Ok(1000));
        assert_eq!(store.increment_and_fetch("t", 1000).await, Ok(2000));
        assert_eq!(store.counter("t"), Some(2000));
    }

    #[tokio::test]
    async fn seeded_counter_continues_from_seed() {
        let store = MemoryRangeStore::new().with_counter("t", 5000);
        assert_eq!(store.increment_and_fetch("t", 10).await, Ok(5010));
    }

    #[tokio::test]
    async fn overflow_is_reported_not_wrapped() {
        let store = MemoryRangeStore::new().with_counter("t", i64::MAX - 1);
        assert!(matches!(
            store.increment_and_fetch("t", 10).await,
            Err(StoreError::Malformed { .. })
        ));
        assert_eq!(store.counter("t"), Some(i64::MAX - 1));
    }

    #[tokio::test]
    async fn closed_store_refuses_increments() {
        let store = MemoryRangeStore::new();
        store.close().await.unwrap();
        assert!(store.is_closed());
        assert!(matches!(
            store.increment_and_fetch("t", 1).await,
            Err(StoreError::Unavailable { .. })
        ));
    }
}
