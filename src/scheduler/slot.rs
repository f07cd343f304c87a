//! Slot-window scheduling
//!
//! Every feed owns a fixed position (its slot offset) inside its refresh
//! interval, derived from a stable hash of (url, interval). Feeds sharing
//! an interval therefore spread uniformly across it instead of fetching in
//! one synchronized burst. Each scheduler tick computes the current window
//! inside the interval cycle and selects the feeds whose slot falls inside
//! it; over one full interval's worth of ticks every feed is selected
//! exactly once.

use serde::Serialize;

use crate::storage::FeedCondition;

/// FNV-1a 64-bit offset basis
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit hash
fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Compute a feed's slot offset for a given effective interval.
///
/// Deterministic: the same (url, interval) pair always yields the same
/// offset, and `0 <= offset < interval_ms` holds. Recompute only when the
/// effective interval changes.
pub fn slot_offset_ms(url: &str, refresh_rate_seconds: u64) -> u64 {
    let interval_ms = refresh_rate_seconds.max(1) * 1000;
    let input = format!("{url}:{refresh_rate_seconds}");
    fnv1a_64(input.as_bytes()) % interval_ms
}

/// The window of slot positions one tick services for one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotWindow {
    /// Window start inside the interval cycle
    pub window_start_ms: u64,

    /// Window end, exclusive; may exceed the interval when wrapping
    pub window_end_ms: u64,

    /// Whether the window extends past the interval boundary
    pub wraps_around_interval: bool,

    /// The interval this window partitions
    pub refresh_rate_ms: u64,
}

impl SlotWindow {
    /// Compute the current window from wall-clock time.
    ///
    /// The window is `[now mod interval, now mod interval + width)`. When
    /// the end extends past the interval the match splits into the two
    /// disjoint ranges `[start, interval)` and `[0, end - interval)`.
    pub fn compute(now_ms: u64, refresh_rate_ms: u64, window_width_ms: u64) -> Self {
        let refresh_rate_ms = refresh_rate_ms.max(1);
        let window_start_ms = now_ms % refresh_rate_ms;
        let window_end_ms = window_start_ms + window_width_ms;

        Self {
            window_start_ms,
            window_end_ms,
            wraps_around_interval: window_end_ms > refresh_rate_ms,
            refresh_rate_ms,
        }
    }

    /// Whether a slot offset falls inside this window
    pub fn contains(&self, slot_offset_ms: u64) -> bool {
        if self.wraps_around_interval {
            slot_offset_ms >= self.window_start_ms && slot_offset_ms < self.refresh_rate_ms
                || slot_offset_ms < self.window_end_ms - self.refresh_rate_ms
        } else {
            slot_offset_ms >= self.window_start_ms && slot_offset_ms < self.window_end_ms
        }
    }

    /// The slot-membership condition for storage pushdown, including the
    /// legacy exemption for feeds with no offset yet
    pub fn slot_condition(&self) -> FeedCondition {
        let mut branches = vec![FeedCondition::SlotOffsetMissing];

        if self.wraps_around_interval {
            branches.push(FeedCondition::SlotOffsetInRange {
                start_ms: self.window_start_ms,
                end_ms: self.refresh_rate_ms,
            });
            branches.push(FeedCondition::SlotOffsetInRange {
                start_ms: 0,
                end_ms: self.window_end_ms - self.refresh_rate_ms,
            });
        } else {
            branches.push(FeedCondition::SlotOffsetInRange {
                start_ms: self.window_start_ms,
                end_ms: self.window_end_ms,
            });
        }

        FeedCondition::AnyOf(branches)
    }
}

/// The full due-feed selection for one (tick, interval) pair: interval
/// match, feed enabled, at least one active destination, and slot
/// membership, as one compound condition for the storage query.
pub fn due_feeds_condition(refresh_rate_seconds: u64, window: &SlotWindow) -> FeedCondition {
    FeedCondition::AllOf(vec![
        FeedCondition::RefreshRateSecondsEq(refresh_rate_seconds),
        FeedCondition::NotDisabled,
        FeedCondition::HasActiveDestination,
        window.slot_condition(),
    ])
}
