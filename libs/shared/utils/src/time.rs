use chrono::{DateTime, Utc};

/// Half-open interval overlap: `[a_start, a_end)` intersects `[b_start, b_end)`.
///
/// Windows that merely touch at a boundary (a_end == b_start) do not overlap.
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Reject inverted or zero-length windows before they reach a query.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), String> {
    if start >= end {
        return Err(format!(
            "Invalid time window: start ({}) must be before end ({})",
            start, end
        ));
    }
    Ok(())
}

/// Merge a set of intervals into a sorted, non-overlapping cover.
///
/// Adjacent intervals (end == next start) are coalesced; the worker treats a
/// busy boundary as free on the other side, so coalescing is safe.
pub fn merge_intervals(
    mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if intervals.is_empty() {
        return intervals;
    }

    intervals.sort_by(|a, b| a.0.cmp(&b.0));

    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 => {
                if end > last.1 {
                    last.1 = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }

    merged
}
