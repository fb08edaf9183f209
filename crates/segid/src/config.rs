//! Tuning knobs for [`SegmentAllocator`](crate::SegmentAllocator).
//!
//! Every value has a default matching the behavior the allocator was designed
//! around (ranges of 1000, prefetch at 80%, three refill attempts with a linear
//! 100ms backoff). Values are immutable once the allocator is built.

use core::time::Duration;

use crate::error::{Error, Result};

/// Default width of each range reserved from the store.
pub const DEFAULT_STEP: i64 = 1000;

/// Default fraction of the active segment consumed before prefetching.
pub const DEFAULT_PREFETCH_THRESHOLD: f64 = 0.8;

/// Default upper bound on a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of store round trips tried by a blocking refill.
pub const DEFAULT_REFILL_ATTEMPTS: usize = 3;

/// Default base delay; the n-th retry waits `n * base`.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Default number of segment switches a single `next_id` call may perform.
pub const DEFAULT_MAX_SWITCH_RETRIES: usize = 2;

/// Default delay between checks while another caller's refill is in flight.
pub const DEFAULT_IN_FLIGHT_POLL: Duration = Duration::from_millis(1);

/// Configuration for a [`SegmentAllocator`](crate::SegmentAllocator).
///
/// # Example
/// ```
/// use core::time::Duration;
/// use segid::AllocatorConfig;
///
/// let config = AllocatorConfig::new("orders")
///     .with_step(5000)
///     .with_store_timeout(Duration::from_millis(500));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatorConfig {
    /// Business tag partitioning the counter namespace in the store.
    pub tag: String,
    /// Width of each range reserved from the store.
    pub step: i64,
    /// Fraction of the active segment, in `(0, 1]`, consumed before a
    /// background prefetch is started.
    pub prefetch_threshold: f64,
    /// Upper bound on a single store round trip. A call that takes longer is
    /// treated as the store being unavailable.
    pub store_timeout: Duration,
    /// Store round trips tried before a blocking refill gives up.
    pub refill_attempts: usize,
    /// Linear backoff base between failed refill attempts.
    pub backoff_base: Duration,
    /// Segment switches a single `next_id` call may perform before failing.
    pub max_switch_retries: usize,
    /// Delay between checks while waiting on a refill another caller started.
    pub in_flight_poll: Duration,
}

impl AllocatorConfig {
    /// Creates a configuration for `tag` with every other value defaulted.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            step: DEFAULT_STEP,
            prefetch_threshold: DEFAULT_PREFETCH_THRESHOLD,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            refill_attempts: DEFAULT_REFILL_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            max_switch_retries: DEFAULT_MAX_SWITCH_RETRIES,
            in_flight_poll: DEFAULT_IN_FLIGHT_POLL,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    #[must_use]
    pub fn with_prefetch_threshold(mut self, threshold: f64) -> Self {
        self.prefetch_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_refill_attempts(mut self, attempts: usize) -> Self {
        self.refill_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    #[must_use]
    pub fn with_max_switch_retries(mut self, retries: usize) -> Self {
        self.max_switch_retries = retries;
        self
    }

    #[must_use]
    pub fn with_in_flight_poll(mut self, poll: Duration) -> Self {
        self.in_flight_poll = poll;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first offending value.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.tag.is_empty() {
            "tag must not be empty"
        } else if self.step <= 0 {
            "step must be greater than 0"
        } else if !(self.prefetch_threshold > 0.0 && self.prefetch_threshold <= 1.0) {
            "prefetch threshold must be within (0, 1]"
        } else if self.store_timeout.is_zero() {
            "store timeout must be greater than 0"
        } else if self.refill_attempts == 0 {
            "refill attempts must be greater than 0"
        } else if self.max_switch_retries == 0 {
            "max switch retries must be greater than 0"
        } else if self.in_flight_poll.is_zero() {
            "in-flight poll interval must be greater than 0"
        } else {
            return Ok(());
        };

        Err(Error::InvalidConfig {
            reason: reason.to_string(),
        })
    }

    /// Number of polls a blocked caller spends waiting on someone else's
    /// refill before counting it as a failed attempt. Covers one full store
    /// timeout.
    pub(crate) fn max_in_flight_polls(&self) -> u128 {
        self.store_timeout.as_nanos() / self.in_flight_poll.as_nanos().max(1) + 1
    }

    /// Delay before the retry following the `failures`-th failed attempt.
    pub(crate) fn backoff(&self, failures: usize) -> Duration {
        self.backoff_base
            .saturating_mul(u32::try_from(failures).unwrap_or(u32::MAX))
    }
}
