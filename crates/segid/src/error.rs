//! Error taxonomy for segment loading and ID allocation.
//!
//! Errors are layered the same way the work is:
//!
//! - [`StoreError`] - raised by a [`RangeStore`] implementation.
//! - [`LoadError`] - raised by [`SegmentLoader::refill`]; either the store was
//!   unreachable (transient) or it returned a counter that cannot be turned
//!   into a valid segment (non-retriable).
//! - [`Error`] - raised by [`SegmentAllocator`] and surfaced to callers.
//!
//! [`RangeStore`]: crate::RangeStore
//! [`SegmentLoader::refill`]: crate::SegmentLoader::refill
//! [`SegmentAllocator`]: crate::SegmentAllocator

/// A result type defaulting to the allocator [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors produced by a [`RangeStore`](crate::RangeStore).
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached or the operation failed in transit.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The record exists but its counter could not be read as an integer.
    #[error("malformed store record: {reason}")]
    Malformed { reason: String },

    /// Establishing the store connection failed.
    #[error("store connection failed: {reason}")]
    Connect { reason: String },
}

/// Errors produced while loading a new segment.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadError {
    /// The store was unreachable, failed, or did not answer within the
    /// configured timeout. Retriable.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The store returned a counter that cannot describe a valid range.
    /// Treated as corruption and never retried.
    #[error("store returned an invalid range end: {value}")]
    InvalidRange { value: i64 },
}

impl LoadError {
    /// Returns `true` if retrying the same refill may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl From<StoreError> for LoadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { reason } | StoreError::Connect { reason } => {
                Self::StoreUnavailable { reason }
            }
            // A record we cannot read is as bad as one holding a bogus value.
            StoreError::Malformed { .. } => Self::InvalidRange { value: 0 },
        }
    }
}

/// All errors the allocator can surface to a caller of `next_id`.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The store was unreachable while loading the initial segment.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The store returned a counter that cannot describe a valid range.
    #[error("store returned an invalid range end: {value}")]
    InvalidRange { value: i64 },

    /// There is no active segment to dispense from.
    #[error("no active segment")]
    NoSegment,

    /// The active segment was exhausted and no replacement could be obtained
    /// within the retry budget. The allocator stays usable.
    #[error("segment switch failed after {attempts} attempt(s)")]
    SwitchFailed {
        attempts: usize,
        #[source]
        source: Option<LoadError>,
    },

    /// The allocator has been closed.
    #[error("allocator is closed")]
    Closed,

    /// The allocator configuration was rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::StoreUnavailable { reason } => Self::StoreUnavailable { reason },
            LoadError::InvalidRange { value } => Self::InvalidRange { value },
        }
    }
}
