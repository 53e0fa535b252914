//! Complement of a coverage set: the missing-range plan.

use super::Interval;

/// Returns the ranges of `[0, total_size)` not covered by `covered`.
///
/// `covered` must be a coverage set. A single scan tracks the end of the last
/// covered range and emits a gap whenever the next range starts beyond it,
/// plus a trailing gap up to `total_size`. Ranges past `total_size` are
/// clipped. An empty `covered` yields `[[0, total_size]]`.
pub fn invert_progress(covered: &[Interval], total_size: u64) -> Vec<Interval> {
    if covered.is_empty() {
        return vec![Interval::new(0, total_size)];
    }

    let mut out = Vec::new();
    let mut prev_end = 0u64;
    for r in covered {
        let start = r.start.min(total_size);
        if start > prev_end {
            out.push(Interval::new(prev_end, start));
        }
        prev_end = prev_end.max(r.end.min(total_size));
    }
    if prev_end < total_size {
        out.push(Interval::new(prev_end, total_size));
    }
    out
}
