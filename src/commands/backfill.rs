//! The `backfill` command: persist slot offsets for legacy feeds

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::scheduler::backfill_slot_offsets;
use crate::storage::MemoryFeedStore;

/// Run the slot-offset backfill against the configured feed store
pub async fn backfill(config: Config, batch_size: usize) -> Result<()> {
    let store = Arc::new(MemoryFeedStore::new());

    if let Some(path) = &config.scheduler.feeds_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feeds file: {}", path.display()))?;
        let parsed: FeedsFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse feeds file: {}", path.display()))?;
        for feed in parsed.feeds {
            store.upsert(feed).await;
        }
    }

    let report = backfill_slot_offsets(store, batch_size).await?;

    tracing::info!(
        feeds_updated = report.feeds_updated,
        batches = report.batches,
        "Backfill complete"
    );
    println!(
        "Backfilled {} feeds in {} batches",
        report.feeds_updated, report.batches
    );
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct FeedsFile {
    #[serde(default)]
    feeds: Vec<crate::models::FeedRecord>,
}
