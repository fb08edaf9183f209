use core::future::Future;
use std::sync::Arc;

use crate::error::StoreError;

/// The shared, durable counter that hands out ranges of the ID space.
///
/// A store keeps one integer per business tag: the largest range end ever
/// allocated for it. [`RangeStore::increment_and_fetch`] atomically adds
/// `step` to that integer and returns the new value, creating the record from
/// an implicit base of `0` on first use. Implementations must be safe under any
/// number of concurrent callers, including callers in other processes, and
/// must never let the counter decrease.
pub trait RangeStore: Send + Sync + 'static {
    /// Atomically adds `step` to the counter for `tag` and returns the result.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store is unreachable or the record
    /// cannot be read.
    fn increment_and_fetch(
        &self,
        tag: &str,
        step: i64,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Releases any connection held by the store.
    ///
    /// The default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the connection could not be shut down
    /// cleanly.
    fn close(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        async { Ok(()) }
    }
}

impl<S> RangeStore for Arc<S>
where
    S: RangeStore,
{
    fn increment_and_fetch(
        &self,
        tag: &str,
        step: i64,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send {
        S::increment_and_fetch(self, tag, step)
    }

    fn close(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        S::close(self)
    }
}
