//! Byte-range coverage algebra.
//!
//! A coverage set is a list of half-open intervals sorted by start where every
//! neighbouring pair satisfies `a.end < b.start` (no overlap, no touching).
//! Progress streamed by the fetch engine is folded in with [`merge_progress`];
//! [`invert_progress`] turns durable write coverage into the ranges still
//! missing when a task resumes.

mod invert;
mod merge;

use serde::{Deserialize, Serialize};

pub use invert::invert_progress;
pub use merge::{merge_all, merge_progress};

/// A byte range `[start, end)` (half-open).
///
/// Serialized as a two-element array `[start, end]`, the shape the fetch
/// engine uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct Interval {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl Interval {
    /// Builds `[start, end)`. An `end` below `start` collapses to an empty range.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Length of this range in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl From<(u64, u64)> for Interval {
    fn from((start, end): (u64, u64)) -> Self {
        Interval::new(start, end)
    }
}

impl From<Interval> for (u64, u64) {
    fn from(r: Interval) -> Self {
        (r.start, r.end)
    }
}

/// True if `set` is sorted, free of empty ranges, and strictly separated.
pub fn is_coverage_set(set: &[Interval]) -> bool {
    set.iter().all(|r| !r.is_empty()) && set.windows(2).all(|w| w[0].end < w[1].start)
}
