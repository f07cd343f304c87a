//! The `run` command: wire components and drive the scheduler loop

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::Config;
use crate::delivery::{WebhookSink, WebhookSinkConfig};
use crate::fetch::HttpFetcher;
use crate::filters::FilterEvaluator;
use crate::lock::{LockStore, MemoryLockStore, ProcessingLock, RedisLockStore};
use crate::metrics;
use crate::models::FeedRecord;
use crate::scheduler::{
    RefreshRateResolver, RunnerContext, StaticBenefitsProvider, TierRates, UpdateRunner,
};
use crate::storage::{MemoryFeedStore, MemorySeenStore};
use crate::utils::RetryConfig;

/// TOML feeds file for single-node mode
#[derive(Debug, Deserialize)]
struct FeedsFile {
    #[serde(default)]
    feeds: Vec<FeedRecord>,
}

/// Run the scheduler until interrupted
pub async fn run(config: Config) -> Result<()> {
    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    let lock_store: Arc<dyn LockStore> = match &config.redis.url {
        Some(url) => {
            tracing::info!(url = %url, "Using Redis lock store");
            Arc::new(RedisLockStore::new(url, config.redis.pool_size)?)
        }
        None => {
            tracing::info!("No Redis URL configured, using the in-memory lock store");
            Arc::new(MemoryLockStore::new())
        }
    };

    let feed_store = Arc::new(MemoryFeedStore::new());
    if let Some(path) = &config.scheduler.feeds_file {
        let loaded = load_feeds(&feed_store, path).await?;
        tracing::info!(feeds = loaded, path = %path.display(), "Seeded feed store");
    } else {
        tracing::warn!("No feeds file configured; the store starts empty");
    }

    let fetcher = HttpFetcher::new(
        config.fetch.requests_per_second,
        Duration::from_secs(config.fetch.request_timeout_secs),
        RetryConfig::new(config.fetch.max_retries),
    )?;

    let sink = WebhookSink::new(WebhookSinkConfig {
        auth_token: config.delivery.auth_token.clone(),
        headers: Default::default(),
        timeout_secs: config.delivery.timeout_secs,
        max_retries: config.delivery.max_retries,
    })?;

    let rates = TierRates {
        default_seconds: config.rates.default_refresh_minutes * 60,
        vip_seconds: config.rates.vip_refresh_minutes * 60,
    };

    let ctx = RunnerContext {
        feed_store,
        seen_store: Arc::new(MemorySeenStore::new()),
        fetcher: Arc::new(fetcher),
        sink: Arc::new(sink),
        benefits: Arc::new(StaticBenefitsProvider::new()),
        lock: ProcessingLock::with_ttl(lock_store, config.lock_ttl()),
        rate_resolver: RefreshRateResolver::new(rates, config.rates.schedules.clone()),
        evaluator: FilterEvaluator::new(config.regex_timeout()),
    };

    let runner = UpdateRunner::new(ctx, config.tick_period(), config.scheduler.max_concurrency);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight feeds");
            let _ = shutdown_tx.send(true);
        }
    });

    runner.run(shutdown_rx).await;
    Ok(())
}

/// Load feed records from a TOML file into the store
async fn load_feeds(store: &MemoryFeedStore, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feeds file: {}", path.display()))?;
    let parsed: FeedsFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse feeds file: {}", path.display()))?;

    let count = parsed.feeds.len();
    for feed in parsed.feeds {
        store.upsert(feed).await;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_feeds_from_toml() {
        let toml_text = r#"
            [[feeds]]
            id = "f1"
            title = "Example"
            url = "https://example.com/rss"
            owner_id = "owner-1"
            refresh_rate_seconds = 600

            [[feeds.destinations]]
            id = "d1"
            name = "main"
            url = "https://hooks.example.com/x"
        "#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.toml");
        std::fs::write(&path, toml_text).unwrap();

        let store = MemoryFeedStore::new();
        let count = load_feeds(&store, &path).await.unwrap();
        assert_eq!(count, 1);

        let feed = store.get("f1").await.unwrap();
        assert_eq!(feed.url, "https://example.com/rss");
        assert_eq!(feed.destinations.len(), 1);
    }
}
