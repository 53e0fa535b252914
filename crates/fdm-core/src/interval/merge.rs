//! Inserting ranges into a coverage set.

use super::Interval;

/// Inserts `incoming` into the coverage set `existing` and returns the result.
///
/// The insertion point is found by binary search over start offsets, then only
/// the immediate neighbours are inspected:
/// - left and right both touch `incoming`: the three fuse into one range;
/// - only the left touches: the left range is extended to `incoming.end`;
/// - only the right touches: the right range is pulled back to `incoming.start`;
/// - neither: `incoming` is inserted as a new range.
///
/// Ranges are mergeable when one ends exactly where the other starts. Chunk
/// boundaries from the engine are contiguous, so there is no gap tolerance.
/// Overlapping input is absorbed into the union so the result is always a
/// coverage set, and merging an already covered range is a no-op.
/// Empty ranges are ignored.
pub fn merge_progress(mut existing: Vec<Interval>, incoming: Interval) -> Vec<Interval> {
    if incoming.is_empty() {
        return existing;
    }

    let idx = existing.partition_point(|r| r.start < incoming.start);

    let mut lo = idx;
    if lo > 0 && existing[lo - 1].end >= incoming.start {
        lo -= 1;
    }
    let mut hi = idx;
    while hi < existing.len() && existing[hi].start <= incoming.end {
        hi += 1;
    }

    if lo == hi {
        existing.insert(idx, incoming);
        return existing;
    }

    let fused = Interval {
        start: existing[lo].start.min(incoming.start),
        end: existing[hi - 1].end.max(incoming.end),
    };
    existing.splice(lo..hi, std::iter::once(fused));
    existing
}

/// Flattens several per-worker range lists into one coverage set.
///
/// Used to rebuild a task's total write coverage from the partial sequences
/// each worker reported: all ranges are sorted by start and collapsed in a
/// single linear pass.
pub fn merge_all(sets: &[Vec<Interval>]) -> Vec<Interval> {
    let mut flat: Vec<Interval> = sets
        .iter()
        .flatten()
        .copied()
        .filter(|r| !r.is_empty())
        .collect();
    flat.sort_unstable_by_key(|r| r.start);

    let mut out: Vec<Interval> = Vec::with_capacity(flat.len());
    for r in flat {
        match out.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => out.push(r),
        }
    }
    debug_assert!(super::is_coverage_set(&out));
    out
}
