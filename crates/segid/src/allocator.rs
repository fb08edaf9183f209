use core::marker::PhantomData;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use portable_atomic::{AtomicBool, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    config::AllocatorConfig,
    error::{Error, LoadError, Result, StoreError},
    loader::{RefillStatus, SegmentLoader},
    segment::{Claim, Segment, SegmentRange},
    sleep::{SleepProvider, TokioSleep},
    store::RangeStore,
};

/// A double-buffered, lock-free segment allocator.
///
/// IDs are dispensed from an *active* [`Segment`] with one atomic increment
/// per call. Once a caller pushes the active segment past the configured
/// prefetch threshold, the next range is reserved from the [`RangeStore`] in a
/// detached Tokio task and parked as *standby*. When the active segment runs
/// out, the caller that notices promotes the standby with a single
/// compare-and-swap of the active pointer; if no standby is ready it refills
/// synchronously with a bounded, linearly backed-off retry.
///
/// ## Features
/// - ✅ Thread-safe, no lock on the dispensing path
/// - ✅ At most one store round trip in flight at a time
/// - ✅ Never returns a duplicate or an over-range value
/// - ❌ Gap-free; ranges reserved but not fully used are abandoned on restart
///
/// ## Runtime
/// [`Self::next_id`] must be polled inside a Tokio runtime with the time
/// driver enabled: prefetch is spawned with [`tokio::spawn`] and store calls
/// are bounded with [`tokio::time::timeout`].
///
/// # Example
/// ```
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// use segid::{AllocatorConfig, MemoryRangeStore, SegmentAllocator};
///
/// let allocator = SegmentAllocator::new(MemoryRangeStore::new(), AllocatorConfig::new("orders"))
///     .await
///     .unwrap();
///
/// assert_eq!(allocator.next_id().await, Ok(1));
/// assert_eq!(allocator.next_id().await, Ok(2));
/// # });
/// ```
pub struct SegmentAllocator<S, P = TokioSleep>
where
    S: RangeStore,
    P: SleepProvider,
{
    active: ArcSwapOption<Segment>,
    loader: Arc<SegmentLoader<S>>,
    config: AllocatorConfig,
    closed: AtomicBool,
    _sleep: PhantomData<fn() -> P>,
}

/// Point-in-time view of an allocator's slots and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AllocatorSnapshot {
    pub tag: String,
    pub step: i64,
    pub active: Option<SegmentRange>,
    pub standby: Option<SegmentRange>,
    pub loading: bool,
    pub closed: bool,
}

impl<S> SegmentAllocator<S, TokioSleep>
where
    S: RangeStore,
{
    /// Creates an allocator and synchronously loads its first segment.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `config` does not validate.
    /// - [`Error::StoreUnavailable`] if the store could not be reached within
    ///   `config.refill_attempts` attempts.
    /// - [`Error::InvalidRange`] if the store returned an unusable counter.
    ///
    /// An allocator that fails here must not be used to serve traffic.
    pub async fn new(store: S, config: AllocatorConfig) -> Result<Self> {
        Self::with_sleep(store, config).await
    }
}

impl<S, P> SegmentAllocator<S, P>
where
    S: RangeStore,
    P: SleepProvider,
{
    /// Like [`SegmentAllocator::new`], but backs off with the given
    /// [`SleepProvider`].
    ///
    /// # Errors
    ///
    /// Same as [`SegmentAllocator::new`].
    pub async fn with_sleep(store: S, config: AllocatorConfig) -> Result<Self> {
        config.validate()?;

        let allocator = Self {
            active: ArcSwapOption::empty(),
            loader: Arc::new(SegmentLoader::from_config(store, &config)),
            config,
            closed: AtomicBool::new(false),
            _sleep: PhantomData,
        };
        allocator.load_initial().await?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            tag = %allocator.config.tag,
            step = allocator.config.step,
            "Segment allocator ready"
        );

        Ok(allocator)
    }

    async fn load_initial(&self) -> Result<()> {
        let mut failures = 0;
        loop {
            match self.loader.refill().await {
                Ok(_) => {
                    let first = self.loader.take_standby().ok_or(Error::NoSegment)?;
                    self.active.store(Some(first));
                    return Ok(());
                }
                Err(e) if e.is_transient() && failures + 1 < self.config.refill_attempts => {
                    failures += 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Initial segment load failed (attempt {failures}): {e}");
                    P::sleep_for(self.config.backoff(failures)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns the next ID.
    ///
    /// The fast path is one atomic increment on the active segment. Crossing
    /// the prefetch threshold spawns a background refill without waiting for
    /// it. Exhausting the active segment promotes the standby, or refills
    /// synchronously if none is ready, then retries.
    ///
    /// IDs returned to one caller are strictly increasing, and no ID is ever
    /// returned twice by the same allocator.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] after [`Self::close`].
    /// - [`Error::NoSegment`] if there is no active segment.
    /// - [`Error::SwitchFailed`] if no replacement segment could be obtained
    ///   within the retry budget. The next call tries again.
    /// - [`Error::InvalidRange`] if the store returned an unusable counter
    ///   while switching.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn next_id(&self) -> Result<i64> {
        let mut switches = 0;
        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }

            let exhausted = {
                let active = self.active.load();
                let Some(segment) = &*active else {
                    return Err(Error::NoSegment);
                };
                match segment.claim() {
                    Claim::Ready { id } => {
                        self.maybe_prefetch(segment, id);
                        return Ok(id);
                    }
                    Claim::Exhausted => Arc::clone(segment),
                }
            };

            if switches == self.config.max_switch_retries {
                return Err(Error::SwitchFailed {
                    attempts: switches,
                    source: None,
                });
            }
            self.switch(&exhausted).await?;
            switches += 1;
        }
    }

    /// Returns `count` IDs, or the first error encountered.
    ///
    /// No partial batch is ever returned: if any ID fails, the IDs claimed so
    /// far are discarded.
    ///
    /// # Errors
    ///
    /// Same as [`Self::next_id`].
    pub async fn next_ids(&self, count: usize) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.next_id().await?);
        }
        Ok(ids)
    }

    fn maybe_prefetch(&self, segment: &Segment, id: i64) {
        if segment.usage(id) < self.config.prefetch_threshold
            || self.loader.has_standby()
            || self.loader.is_loading()
            || self.is_closed()
            || !self.loader.try_schedule_prefetch()
        {
            return;
        }

        let scheduled = ScheduledPrefetch {
            loader: Arc::clone(&self.loader),
        };
        let fut = async move {
            match scheduled.loader.prefetch().await {
                Ok(_status) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Prefetch finished: {_status:?}");
                }
                Err(_e) => {
                    // Best effort: the blocking switch path will retry.
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Prefetch failed: {_e}");
                }
            }
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::debug_span!("prefetch", tag = %self.config.tag))
        };

        tokio::spawn(fut);
    }

    /// Replaces `exhausted` as the active segment.
    ///
    /// Returns once the active slot no longer holds `exhausted`, whether this
    /// caller or a concurrent one did the replacement.
    async fn switch(&self, exhausted: &Arc<Segment>) -> Result<()> {
        let expected = Some(Arc::clone(exhausted));
        let attempts = self.config.refill_attempts;
        let mut failures = 0;
        let mut polls: u64 = 0;

        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }
            if !self.is_active(exhausted) {
                return Ok(());
            }
            if let Some(next) = self.loader.take_standby() {
                self.promote(&expected, exhausted, next);
                continue;
            }

            let failure = match self.loader.refill().await {
                Ok(RefillStatus::Loaded | RefillStatus::Skipped) => continue,
                Ok(RefillStatus::InFlight) => {
                    polls += 1;
                    if u128::from(polls) <= self.config.max_in_flight_polls() {
                        P::sleep_for(self.config.in_flight_poll).await;
                        continue;
                    }
                    polls = 0;
                    LoadError::StoreUnavailable {
                        reason: "in-flight refill did not complete".to_string(),
                    }
                }
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e.into()),
            };

            failures += 1;
            #[cfg(feature = "tracing")]
            tracing::warn!("Segment refill failed (attempt {failures}/{attempts}): {failure}");

            if failures >= attempts {
                #[cfg(feature = "tracing")]
                tracing::error!(tag = %self.config.tag, "Segment switch failed");
                return Err(Error::SwitchFailed {
                    attempts: failures,
                    source: Some(failure),
                });
            }
            P::sleep_for(self.config.backoff(failures)).await;
        }
    }

    /// Swaps `next` in for `exhausted` with one compare-and-swap.
    ///
    /// A segment that does not lie entirely above `exhausted` is stale and is
    /// dropped. If another caller already replaced `exhausted`, `next` goes
    /// back to the standby slot, provided it still lies above the new active
    /// segment.
    pub(crate) fn promote(
        &self,
        expected: &Option<Arc<Segment>>,
        exhausted: &Segment,
        next: Arc<Segment>,
    ) {
        if !next.follows(exhausted) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                min = next.min(),
                max = next.max(),
                "Dropping stale standby segment"
            );
            return;
        }

        let previous = self.active.compare_and_swap(expected, Some(Arc::clone(&next)));
        if same_segment(&previous, exhausted) {
            #[cfg(feature = "tracing")]
            tracing::debug!(min = next.min(), max = next.max(), "Promoted standby segment");
            return;
        }

        let still_ahead = previous
            .as_deref()
            .is_some_and(|current| next.follows(current));
        if !(still_ahead && self.loader.restore_standby(next)) {
            #[cfg(feature = "tracing")]
            tracing::debug!("Lost switch race, dropping surplus segment");
        }
    }

    fn is_active(&self, segment: &Segment) -> bool {
        same_segment(&self.active.load(), segment)
    }

    /// Closes the allocator and releases the store.
    ///
    /// Every later [`Self::next_id`] call fails with [`Error::Closed`].
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it could not be shut down cleanly. The
    /// allocator is closed regardless.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.active.store(None);
        let _ = self.loader.take_standby();

        #[cfg(feature = "tracing")]
        tracing::info!(tag = %self.config.tag, "Segment allocator closed");

        self.loader.store().close().await
    }

    /// Returns `true` once [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the current state of both slots and flags.
    pub fn snapshot(&self) -> AllocatorSnapshot {
        AllocatorSnapshot {
            tag: self.config.tag.clone(),
            step: self.config.step,
            active: self.active.load().as_deref().map(Segment::range),
            standby: self.loader.standby_range(),
            loading: self.loader.is_loading(),
            closed: self.is_closed(),
        }
    }

    /// The configuration this allocator was built with.
    pub const fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// The loader feeding this allocator.
    pub fn loader(&self) -> &SegmentLoader<S> {
        &self.loader
    }
}

/// Clears the loader's scheduled flag when the prefetch task ends, including
/// when the task is dropped before it runs.
struct ScheduledPrefetch<S>
where
    S: RangeStore,
{
    loader: Arc<SegmentLoader<S>>,
}

impl<S> Drop for ScheduledPrefetch<S>
where
    S: RangeStore,
{
    fn drop(&mut self) {
        self.loader.finish_prefetch();
    }
}

fn same_segment(slot: &Option<Arc<Segment>>, segment: &Segment) -> bool {
    slot.as_deref()
        .is_some_and(|current| core::ptr::eq(current, segment))
}
