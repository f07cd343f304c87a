//! Scheduler tick loop and per-feed processing pipeline
//!
//! Each tick runs a single-threaded selection phase (one due-feed query
//! per distinct refresh interval) and a fan-out execution phase with one
//! worker per selected feed, bounded by a semaphore. The processing lock
//! is the sole correctness guard against overlapping ticks or a second
//! scheduler instance touching the same feed; a contended feed is skipped
//! until its next due window, never waited on.
//!
//! A feed's pipeline: lock, re-resolve the effective interval, fetch,
//! skip on an unchanged response hash, resolve the batch identity scheme,
//! diff against the seen store, filter per destination, deliver, record
//! seen. A single feed's failure is logged with context and never affects
//! other feeds or the tick itself.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::delivery::DeliverySink;
use crate::fetch::ArticleFetcher;
use crate::filters::FilterEvaluator;
use crate::identity::{id_type_value, IdentityResolver};
use crate::lock::ProcessingLock;
use crate::metrics;
use crate::models::{FeedRecord, TickStats};
use crate::storage::{FeedStore, SeenArticleStore};

use super::error::SchedulerError;
use super::rate::{BenefitsProvider, RefreshRateResolver};
use super::slot::{due_feeds_condition, slot_offset_ms, SlotWindow};

/// Shared dependencies for the scheduler and its feed workers
pub struct RunnerContext {
    pub feed_store: Arc<dyn FeedStore>,
    pub seen_store: Arc<dyn SeenArticleStore>,
    pub fetcher: Arc<dyn ArticleFetcher>,
    pub sink: Arc<dyn DeliverySink>,
    pub benefits: Arc<dyn BenefitsProvider>,
    pub lock: ProcessingLock,
    pub rate_resolver: RefreshRateResolver,
    pub evaluator: FilterEvaluator,
}

/// The recurring scheduler
pub struct UpdateRunner {
    ctx: Arc<RunnerContext>,
    tick_period: Duration,
    max_concurrency: usize,
}

impl UpdateRunner {
    /// Create a runner
    pub fn new(ctx: RunnerContext, tick_period: Duration, max_concurrency: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            tick_period,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run the tick loop until `shutdown` flips to true.
    ///
    /// In-flight feed workers finish their current feed; locks left behind
    /// by an abandoned worker expire on their own.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Scheduler shutting down");
                        return;
                    }
                    continue;
                }
            }

            let now_ms = Utc::now().timestamp_millis() as u64;
            let stats = self.run_tick(now_ms).await;
            tracing::info!(
                feeds_due = stats.feeds_due,
                feeds_locked = stats.feeds_locked,
                feeds_failed = stats.feeds_failed,
                articles_delivered = stats.articles_delivered,
                articles_blocked = stats.articles_blocked,
                "Tick complete"
            );
        }
    }

    /// Execute one tick at the given wall-clock time.
    ///
    /// Exposed separately so a single tick can be driven deterministically.
    pub async fn run_tick(&self, now_ms: u64) -> TickStats {
        let started = Instant::now();
        let mut stats = TickStats::default();

        let rates = match self.ctx.feed_store.distinct_refresh_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                tracing::error!(error = %e, "Refresh-rate enumeration failed, skipping tick");
                return stats;
            }
        };

        // Selection phase: single-threaded, one compound query per interval
        let window_width_ms = self.tick_period.as_millis() as u64;
        let mut due: Vec<FeedRecord> = Vec::new();
        for rate in rates {
            let window = SlotWindow::compute(now_ms, rate * 1000, window_width_ms);
            let condition = due_feeds_condition(rate, &window);
            match self.ctx.feed_store.find_matching(&condition).await {
                Ok(feeds) => due.extend(feeds),
                Err(e) => {
                    // This interval's selection is retried next tick
                    let err = SchedulerError::selection_failed(rate, &e);
                    tracing::error!(error = %err, "Due-feed selection failed");
                }
            }
        }

        stats.feeds_due = due.len() as u32;
        metrics::record_feeds_due(due.len() as u64);

        // Execution phase: bounded fan-out, one worker per feed
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut workers = JoinSet::new();
        for feed in due {
            let ctx = Arc::clone(&self.ctx);
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return TickStats::default(),
                };
                process_feed(ctx, feed).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(feed_stats) => stats.absorb(feed_stats),
                Err(e) => {
                    stats.feeds_failed += 1;
                    tracing::error!(error = %e, "Feed worker aborted");
                }
            }
        }

        metrics::observe_tick_duration(started.elapsed().as_secs_f64());
        stats
    }

    /// Tick period in effect
    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }
}

/// Process one due feed under its processing lock
async fn process_feed(ctx: Arc<RunnerContext>, feed: FeedRecord) -> TickStats {
    let mut stats = TickStats::default();

    if !ctx.lock.acquire(&feed.id).await {
        tracing::debug!(feed_id = %feed.id, "Feed already being processed, skipping");
        metrics::record_lock_contended();
        stats.feeds_locked = 1;
        return stats;
    }

    let feed_id = feed.id.clone();
    let url = feed.url.clone();
    if let Err(e) = run_pipeline(&ctx, feed, &mut stats).await {
        stats.feeds_failed = 1;
        metrics::record_pipeline_failure(pipeline_stage(&e));
        tracing::error!(feed_id = %feed_id, url = %url, error = %e, "Feed pipeline failed");
    }

    ctx.lock.release(&feed_id).await;
    stats
}

fn pipeline_stage(error: &SchedulerError) -> &'static str {
    match error {
        SchedulerError::SelectionFailed { .. } => "selection",
        SchedulerError::FeedProcessingFailed { .. } => "fetch",
        SchedulerError::PersistFailed { .. } => "persist",
        SchedulerError::BackfillFailed { .. } => "backfill",
    }
}

async fn run_pipeline(
    ctx: &RunnerContext,
    mut feed: FeedRecord,
    stats: &mut TickStats,
) -> Result<(), SchedulerError> {
    // Re-resolve the effective interval; a changed interval (or a missing
    // offset) gets a recomputed slot offset persisted alongside it
    let effective = ctx.rate_resolver.resolve(&feed, ctx.benefits.as_ref()).await;
    if effective != feed.refresh_rate_seconds || feed.slot_offset_ms.is_none() {
        let offset = slot_offset_ms(&feed.url, effective);
        ctx.feed_store
            .apply_refresh_rate(&feed.id, effective, offset)
            .await
            .map_err(|e| SchedulerError::persist_failed(&feed.id, "refresh_rate", e.to_string()))?;
        feed.refresh_rate_seconds = effective;
        feed.slot_offset_ms = Some(offset);
    }

    let payload = ctx.fetcher.fetch(&feed.url).await.map_err(|e| {
        metrics::record_fetch_error();
        SchedulerError::feed_processing_failed(&feed.id, &feed.url, e.to_string())
    })?;

    if feed.last_response_hash.as_deref() == Some(payload.content_hash.as_str()) {
        tracing::debug!(feed_id = %feed.id, "Response body unchanged, skipping");
        metrics::record_feed_unchanged();
        stats.feeds_unchanged = 1;
        return Ok(());
    }

    // Pick the identity scheme for this batch
    let mut resolver = IdentityResolver::new();
    for article in &payload.articles {
        resolver.record_article(article);
    }
    let id_type = resolver.id_type();
    let ids: Vec<String> = payload
        .articles
        .iter()
        .map(|article| id_type_value(article, &id_type))
        .collect();

    tracing::debug!(
        feed_id = %feed.id,
        id_type = %id_type,
        articles = payload.articles.len(),
        failed_types = ?resolver.failed(),
        "Resolved batch identity scheme"
    );

    let initialized = ctx
        .seen_store
        .has_any(&feed.id)
        .await
        .map_err(|e| SchedulerError::persist_failed(&feed.id, "seen_lookup", e.to_string()))?;

    // First cycle: record the whole batch, deliver nothing, so a freshly
    // added feed does not blast its entire backlog
    if !initialized {
        ctx.seen_store
            .record_seen(&feed.id, &id_type, &ids)
            .await
            .map_err(|e| SchedulerError::persist_failed(&feed.id, "record_seen", e.to_string()))?;
        ctx.feed_store
            .set_response_hash(&feed.id, &payload.content_hash)
            .await
            .map_err(|e| {
                SchedulerError::persist_failed(&feed.id, "response_hash", e.to_string())
            })?;
        tracing::info!(
            feed_id = %feed.id,
            articles = ids.len(),
            id_type = %id_type,
            "First cycle for feed, recorded without delivering"
        );
        return Ok(());
    }

    let new_ids = ctx
        .seen_store
        .filter_new(&feed.id, &id_type, &ids)
        .await
        .map_err(|e| SchedulerError::persist_failed(&feed.id, "seen_diff", e.to_string()))?;
    let new_set: HashSet<&str> = new_ids.iter().map(String::as_str).collect();

    // Oldest first, so destinations receive articles in publish order
    for (article, id) in payload.articles.iter().zip(ids.iter()).rev() {
        if !new_set.contains(id.as_str()) {
            continue;
        }

        for destination in feed.active_destinations() {
            match ctx.evaluator.evaluate(destination.filters.as_ref(), article) {
                Ok(outcome) if outcome.passed => {
                    match ctx.sink.deliver(&feed, destination, article).await {
                        Ok(()) => {
                            stats.articles_delivered += 1;
                            metrics::record_articles_delivered(1);
                        }
                        Err(e) => {
                            metrics::record_pipeline_failure("deliver");
                            tracing::error!(
                                feed_id = %feed.id,
                                destination_id = %destination.id,
                                error = %e,
                                "Delivery failed"
                            );
                        }
                    }
                }
                Ok(outcome) => {
                    stats.articles_blocked += 1;
                    metrics::record_articles_blocked(1);
                    tracing::debug!(
                        feed_id = %feed.id,
                        destination_id = %destination.id,
                        explanations = ?outcome.explain_blocked,
                        "Article blocked by destination filter"
                    );
                }
                Err(e) => {
                    // Propagated evaluation error: withhold this article
                    // from this destination, keep the batch going
                    metrics::record_filter_error();
                    tracing::error!(
                        feed_id = %feed.id,
                        destination_id = %destination.id,
                        error = %e,
                        "Filter evaluation failed, withholding article"
                    );
                }
            }
        }
    }

    ctx.seen_store
        .record_seen(&feed.id, &id_type, &new_ids)
        .await
        .map_err(|e| SchedulerError::persist_failed(&feed.id, "record_seen", e.to_string()))?;
    ctx.feed_store
        .set_response_hash(&feed.id, &payload.content_hash)
        .await
        .map_err(|e| SchedulerError::persist_failed(&feed.id, "response_hash", e.to_string()))?;

    Ok(())
}
