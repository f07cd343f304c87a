//! Slot-offset backfill for legacy feeds
//!
//! Feeds created before slot scheduling have no persisted offset and are
//! selected on every tick until migrated. This one-time batch operation
//! computes offsets with the same deterministic hash the live scheduler
//! uses and persists them in bounded batches.

use std::sync::Arc;

use crate::storage::FeedStore;

use super::error::{SchedulerError, SchedulerResult};
use super::slot::slot_offset_ms;

/// Outcome of a backfill run
#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillReport {
    /// Feeds that received an offset
    pub feeds_updated: u64,

    /// Batches executed
    pub batches: u64,
}

/// Backfill slot offsets for every feed lacking one.
///
/// Processes `batch_size` feeds per round trip until the store reports no
/// remaining candidates.
pub async fn backfill_slot_offsets(
    store: Arc<dyn FeedStore>,
    batch_size: usize,
) -> SchedulerResult<BackfillReport> {
    let batch_size = batch_size.max(1);
    let mut report = BackfillReport::default();

    loop {
        let batch = store
            .find_missing_slot_offset(batch_size)
            .await
            .map_err(|e| SchedulerError::BackfillFailed {
                reason: e.to_string(),
            })?;

        if batch.is_empty() {
            break;
        }

        let updates: Vec<(String, u64)> = batch
            .iter()
            .map(|feed| {
                (
                    feed.id.clone(),
                    slot_offset_ms(&feed.url, feed.refresh_rate_seconds),
                )
            })
            .collect();

        store
            .set_slot_offsets(&updates)
            .await
            .map_err(|e| SchedulerError::BackfillFailed {
                reason: e.to_string(),
            })?;

        report.feeds_updated += updates.len() as u64;
        report.batches += 1;

        tracing::info!(
            batch = report.batches,
            updated = updates.len(),
            total = report.feeds_updated,
            "Backfilled slot offsets"
        );
    }

    Ok(report)
}
