use core::time::Duration;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use portable_atomic::{AtomicBool, AtomicI64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    config::AllocatorConfig,
    error::LoadError,
    segment::{Segment, SegmentRange},
    store::RangeStore,
};

/// Outcome of a refill attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillStatus {
    /// A fresh segment was reserved and installed as standby.
    Loaded,
    /// Another refill already holds the loading guard. Nothing was done.
    InFlight,
    /// A standby segment was already present. Nothing was done.
    Skipped,
}

/// Reserves ranges from a [`RangeStore`] and installs them as the standby
/// segment.
///
/// The loader owns the `loading` guard: at most one store round trip is in
/// flight per loader at any time, and callers that find the guard taken return
/// immediately with [`RefillStatus::InFlight`] instead of queueing a second
/// round trip.
pub struct SegmentLoader<S>
where
    S: RangeStore,
{
    store: S,
    tag: String,
    step: i64,
    timeout: Duration,
    standby: ArcSwapOption<Segment>,
    loading: AtomicBool,
    scheduled: AtomicBool,
    last_range_end: AtomicI64,
}

/// Holds the loading flag for the lifetime of one refill.
///
/// Releasing on drop covers every exit path, including the refill future being
/// dropped while the store call is pending.
struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<S> SegmentLoader<S>
where
    S: RangeStore,
{
    /// Creates a loader reserving `step` IDs at a time for `tag`, giving each
    /// store round trip at most `timeout`.
    pub fn new(store: S, tag: impl Into<String>, step: i64, timeout: Duration) -> Self {
        Self {
            store,
            tag: tag.into(),
            step,
            timeout,
            standby: ArcSwapOption::empty(),
            loading: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            last_range_end: AtomicI64::new(0),
        }
    }

    /// Creates a loader from the relevant parts of an [`AllocatorConfig`].
    pub fn from_config(store: S, config: &AllocatorConfig) -> Self {
        Self::new(store, config.tag.clone(), config.step, config.store_timeout)
    }

    /// Reserves a new range and installs it as standby, replacing any standby
    /// that was not consumed yet.
    ///
    /// Returns [`RefillStatus::InFlight`] without touching the store if
    /// another refill is already running.
    ///
    /// # Errors
    ///
    /// - [`LoadError::StoreUnavailable`] if the store failed or did not answer
    ///   within the timeout.
    /// - [`LoadError::InvalidRange`] if the store returned a range end that is
    ///   not positive, leaves no room for a full step above zero, or is not
    ///   beyond the last range this loader saw.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(tag = %self.tag)))]
    pub async fn refill(&self) -> Result<RefillStatus, LoadError> {
        let Some(_guard) = self.try_acquire() else {
            return Ok(RefillStatus::InFlight);
        };
        self.load().await?;
        Ok(RefillStatus::Loaded)
    }

    /// Like [`Self::refill`], but does nothing if a standby segment is already
    /// present once the guard is held.
    ///
    /// Used for background prefetch, where two triggers racing past the
    /// threshold check must not cost two round trips.
    ///
    /// # Errors
    ///
    /// Same as [`Self::refill`].
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(tag = %self.tag)))]
    pub async fn prefetch(&self) -> Result<RefillStatus, LoadError> {
        let Some(_guard) = self.try_acquire() else {
            return Ok(RefillStatus::InFlight);
        };
        if self.has_standby() {
            return Ok(RefillStatus::Skipped);
        }
        self.load().await?;
        Ok(RefillStatus::Loaded)
    }

    fn try_acquire(&self) -> Option<LoadingGuard<'_>> {
        self.loading
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| LoadingGuard {
                flag: &self.loading,
            })
    }

    /// Performs the store round trip. Must only be called with the guard held.
    async fn load(&self) -> Result<(), LoadError> {
        let call = self.store.increment_and_fetch(&self.tag, self.step);
        let range_end = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LoadError::StoreUnavailable {
                    reason: format!("no answer within {:?}", self.timeout),
                });
            }
        };

        let segment = self.validate(range_end)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            min = segment.min(),
            max = segment.max(),
            "Installed standby segment"
        );

        self.standby.store(Some(Arc::new(segment)));
        Ok(())
    }

    fn validate(&self, range_end: i64) -> Result<Segment, LoadError> {
        let invalid = || LoadError::InvalidRange { value: range_end };

        let segment = Segment::from_range_end(range_end, self.step).ok_or_else(invalid)?;
        // The guard serializes writers, so a plain load/store is enough here.
        if range_end <= self.last_range_end.load(Ordering::Acquire) {
            return Err(invalid());
        }
        self.last_range_end.store(range_end, Ordering::Release);
        Ok(segment)
    }

    /// Removes and returns the standby segment, if any.
    pub fn take_standby(&self) -> Option<Arc<Segment>> {
        self.standby.swap(None)
    }

    /// Puts `segment` back into the standby slot if the slot is empty.
    ///
    /// Returns `false` (and drops `segment`) if another standby was installed
    /// in the meantime.
    pub(crate) fn restore_standby(&self, segment: Arc<Segment>) -> bool {
        let empty: Option<Arc<Segment>> = None;
        let previous = self.standby.compare_and_swap(&empty, Some(segment));
        previous.is_none()
    }

    #[cfg(test)]
    pub(crate) fn install_standby(&self, segment: Segment) {
        self.standby.store(Some(Arc::new(segment)));
    }

    /// Returns `true` if a standby segment is waiting to be promoted.
    pub fn has_standby(&self) -> bool {
        self.standby.load().is_some()
    }

    /// Bounds and cursor of the standby segment, if any.
    pub fn standby_range(&self) -> Option<SegmentRange> {
        self.standby.load().as_deref().map(Segment::range)
    }

    /// Marks a background prefetch as scheduled.
    ///
    /// Returns `false` if one is already scheduled and not yet finished, in
    /// which case the caller must not spawn another.
    pub(crate) fn try_schedule_prefetch(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn finish_prefetch(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// Returns `true` while a background prefetch is scheduled or running.
    pub fn is_prefetch_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Returns `true` while a store round trip is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// The business tag ranges are reserved for.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Width of each reserved range.
    pub const fn step(&self) -> i64 {
        self.step
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }
}
