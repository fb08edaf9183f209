use portable_atomic::{AtomicI64, Ordering};

/// Represents the result of attempting to claim an ID from a [`Segment`].
///
/// - [`Claim::Ready`] indicates the cursor advanced to a value inside the
///   range and that value now belongs to the caller.
/// - [`Claim::Exhausted`] means the cursor moved past `max`. The over-range
///   value is never handed out; the caller must switch to a fresh segment.
///
/// # Example
///
/// ```
/// use segid::{Claim, Segment};
///
/// let segment = Segment::new(1, 2);
/// assert_eq!(segment.claim(), Claim::Ready { id: 1 });
/// assert_eq!(segment.claim(), Claim::Ready { id: 2 });
/// assert_eq!(segment.claim(), Claim::Exhausted);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// A unique ID was claimed and is ready to use.
    Ready {
        /// The claimed ID.
        id: i64,
    },
    /// The segment has no IDs left.
    Exhausted,
}

/// A contiguous, inclusive range of the ID space with a lock-free cursor.
///
/// The bounds are fixed at construction. The only mutable state is the cursor,
/// which is advanced with a single atomic increment per claim, so a segment can
/// be shared behind an `Arc` by any number of threads.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ IDs from one segment are strictly increasing in claim order
/// - ❌ Rewinding; a claimed value is gone even if it was over range
#[derive(Debug)]
pub struct Segment {
    min: i64,
    max: i64,
    #[cfg(feature = "cache-padded")]
    cursor: crossbeam_utils::CachePadded<AtomicI64>,
    #[cfg(not(feature = "cache-padded"))]
    cursor: AtomicI64,
}

impl Segment {
    /// Creates a segment covering `min..=max` with nothing claimed yet.
    ///
    /// # Panics
    ///
    /// Panics if `max < min` or `min` is `i64::MIN` (the cursor starts one
    /// below `min`).
    pub fn new(min: i64, max: i64) -> Self {
        assert!(max >= min, "segment max ({max}) is below min ({min})");
        assert!(min > i64::MIN, "segment min must leave room for the cursor");
        Self::from_parts(min, max, min - 1)
    }

    /// Creates the segment a store hands out when its counter reaches
    /// `range_end` after an increment of `step`.
    ///
    /// Returns `None` if the resulting range would not lie entirely within
    /// `1..=range_end`.
    pub fn from_range_end(range_end: i64, step: i64) -> Option<Self> {
        if range_end <= 0 || step <= 0 || range_end < step {
            return None;
        }
        let min = range_end - step + 1;
        Some(Self::from_parts(min, range_end, min - 1))
    }

    fn from_parts(min: i64, max: i64, cursor: i64) -> Self {
        Self {
            min,
            max,
            #[cfg(feature = "cache-padded")]
            cursor: crossbeam_utils::CachePadded::new(AtomicI64::new(cursor)),
            #[cfg(not(feature = "cache-padded"))]
            cursor: AtomicI64::new(cursor),
        }
    }

    /// Smallest ID in the segment.
    pub const fn min(&self) -> i64 {
        self.min
    }

    /// Largest ID in the segment.
    pub const fn max(&self) -> i64 {
        self.max
    }

    /// Number of IDs the segment covers.
    pub const fn len(&self) -> i64 {
        self.max - self.min + 1
    }

    /// A segment always covers at least one ID.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Last value the cursor advanced to. May exceed `max` once exhausted.
    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Number of IDs that can still be claimed.
    pub fn remaining(&self) -> i64 {
        (self.max - self.cursor()).max(0)
    }

    /// Returns `true` once every ID has been claimed.
    pub fn is_exhausted(&self) -> bool {
        self.cursor() >= self.max
    }

    /// Claims the next ID.
    ///
    /// The cursor is advanced unconditionally. A result beyond `max` is
    /// reported as [`Claim::Exhausted`] and the value is discarded.
    pub fn claim(&self) -> Claim {
        let prev = self.cursor.fetch_add(1, Ordering::Relaxed);
        // Late callers keep advancing an exhausted cursor, and the add wraps
        // at i64::MAX, so check both bounds.
        match prev.checked_add(1) {
            Some(id) if id >= self.min && id <= self.max => Claim::Ready { id },
            _ => Claim::Exhausted,
        }
    }

    /// Fraction of the segment consumed once `id` has been handed out.
    pub fn usage(&self, id: i64) -> f64 {
        let used = id - self.min + 1;
        used as f64 / self.len() as f64
    }

    /// Returns `true` if every ID of `self` is strictly greater than every ID
    /// of `other`.
    pub const fn follows(&self, other: &Self) -> bool {
        self.min > other.max
    }

    /// A copyable view of the bounds and cursor.
    pub fn range(&self) -> SegmentRange {
        SegmentRange {
            min: self.min,
            max: self.max,
            cursor: self.cursor(),
        }
    }
}

/// Point-in-time view of a [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SegmentRange {
    pub min: i64,
    pub max: i64,
    pub cursor: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread::scope;

    #[test]
    fn from_range_end_matches_store_layout() {
        let segment = Segment::from_range_end(1000, 1000).unwrap();
        assert_eq!(segment.min(), 1);
        assert_eq!(segment.max(), 1000);
        assert_eq!(segment.cursor(), 0);
        assert_eq!(segment.len(), 1000);

        let segment = Segment::from_range_end(2000, 1000).unwrap();
        assert_eq!(segment.min(), 1001);
        assert_eq!(segment.cursor(), 1000);
    }

    #[test]
    fn from_range_end_rejects_ranges_below_one() {
        assert!(Segment::from_range_end(0, 1000).is_none());
        assert!(Segment::from_range_end(-5, 1000).is_none());
        assert!(Segment::from_range_end(999, 1000).is_none());
        assert!(Segment::from_range_end(10, 0).is_none());
    }

    #[test]
    fn claims_are_sequential_then_exhausted() {
        let segment = Segment::new(5, 7);
        assert_eq!(segment.claim(), Claim::Ready { id: 5 });
        assert_eq!(segment.claim(), Claim::Ready { id: 6 });
        assert_eq!(segment.remaining(), 1);
        assert_eq!(segment.claim(), Claim::Ready { id: 7 });
        assert!(segment.is_exhausted());
        assert_eq!(segment.claim(), Claim::Exhausted);
        assert_eq!(segment.claim(), Claim::Exhausted);
        assert_eq!(segment.remaining(), 0);
    }

    #[test]
    fn exhausted_segment_near_i64_max_does_not_wrap() {
        let segment = Segment::new(i64::MAX - 1, i64::MAX);
        assert_eq!(segment.claim(), Claim::Ready { id: i64::MAX - 1 });
        assert_eq!(segment.claim(), Claim::Ready { id: i64::MAX });
        assert_eq!(segment.claim(), Claim::Exhausted);
        assert_eq!(segment.claim(), Claim::Exhausted);
        assert_eq!(segment.claim(), Claim::Exhausted);
    }

    #[test]
    fn usage_reaches_threshold_at_eighty_percent() {
        let segment = Segment::from_range_end(1000, 1000).unwrap();
        assert!(segment.usage(799) < 0.8);
        assert!(segment.usage(800) >= 0.8);
        assert_eq!(segment.usage(1000), 1.0);
    }

    #[test]
    fn follows_compares_whole_ranges() {
        let first = Segment::new(1, 10);
        let second = Segment::new(11, 20);
        assert!(second.follows(&first));
        assert!(!first.follows(&second));
        assert!(!first.follows(&first));
    }

    #[test]
    fn concurrent_claims_never_duplicate_or_overrun() {
        const THREADS: usize = 8;
        let segment = Arc::new(Segment::new(1, 10_000));

        let claimed: Vec<Vec<i64>> = scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let segment = Arc::clone(&segment);
                    s.spawn(move || {
                        let mut ids = Vec::new();
                        while let Claim::Ready { id } = segment.claim() {
                            ids.push(id);
                        }
                        ids
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut seen = HashSet::new();
        for ids in &claimed {
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for &id in ids {
                assert!((1..=10_000).contains(&id));
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 10_000);
    }
}
