//! Prometheus metrics for the scheduler
//!
//! Call [`init_metrics`] once at startup to register all metrics. If
//! registration fails, metric operations become no-ops so a metrics
//! problem can never take the scheduler down.

use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::sync::OnceLock;

/// Container for all scheduler metrics
struct SchedulerMetrics {
    feeds_due: Counter,
    locks_contended: Counter,
    feeds_unchanged: Counter,
    fetch_errors: Counter,
    articles_delivered: Counter,
    articles_blocked: Counter,
    filter_errors: Counter,
    pipeline_failures: CounterVec,
    tick_duration: Histogram,
}

/// Global metrics storage
static METRICS: OnceLock<SchedulerMetrics> = OnceLock::new();

/// Initialize all Prometheus metrics.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let metrics = SchedulerMetrics {
        feeds_due: register_counter!(
            "mulgyeol_feeds_due_total",
            "Feeds selected as due across all ticks"
        )?,
        locks_contended: register_counter!(
            "mulgyeol_locks_contended_total",
            "Feed selections skipped because the processing lock was held"
        )?,
        feeds_unchanged: register_counter!(
            "mulgyeol_feeds_unchanged_total",
            "Fetches skipped after an unchanged response hash"
        )?,
        fetch_errors: register_counter!(
            "mulgyeol_fetch_errors_total",
            "Feed fetches that failed after retries"
        )?,
        articles_delivered: register_counter!(
            "mulgyeol_articles_delivered_total",
            "Articles handed to the delivery sink"
        )?,
        articles_blocked: register_counter!(
            "mulgyeol_articles_blocked_total",
            "Articles withheld by destination filters"
        )?,
        filter_errors: register_counter!(
            "mulgyeol_filter_errors_total",
            "Filter evaluations that errored (bad pattern or timeout)"
        )?,
        pipeline_failures: register_counter_vec!(
            "mulgyeol_pipeline_failures_total",
            "Feed pipeline failures by stage",
            &["stage"]
        )?,
        tick_duration: register_histogram!(
            "mulgyeol_tick_duration_seconds",
            "Wall-clock duration of one scheduler tick",
            vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]
        )?,
    };

    let _ = METRICS.set(metrics);
    Ok(())
}

/// Record feeds selected as due
pub fn record_feeds_due(count: u64) {
    if let Some(m) = METRICS.get() {
        m.feeds_due.inc_by(count as f64);
    }
}

/// Record a skipped feed whose lock was held
pub fn record_lock_contended() {
    if let Some(m) = METRICS.get() {
        m.locks_contended.inc();
    }
}

/// Record a skipped feed whose response body was unchanged
pub fn record_feed_unchanged() {
    if let Some(m) = METRICS.get() {
        m.feeds_unchanged.inc();
    }
}

/// Record a failed fetch
pub fn record_fetch_error() {
    if let Some(m) = METRICS.get() {
        m.fetch_errors.inc();
    }
}

/// Record delivered articles
pub fn record_articles_delivered(count: u64) {
    if let Some(m) = METRICS.get() {
        m.articles_delivered.inc_by(count as f64);
    }
}

/// Record filter-blocked articles
pub fn record_articles_blocked(count: u64) {
    if let Some(m) = METRICS.get() {
        m.articles_blocked.inc_by(count as f64);
    }
}

/// Record a filter evaluation error
pub fn record_filter_error() {
    if let Some(m) = METRICS.get() {
        m.filter_errors.inc();
    }
}

/// Record a pipeline failure for a stage name
pub fn record_pipeline_failure(stage: &str) {
    if let Some(m) = METRICS.get() {
        m.pipeline_failures.with_label_values(&[stage]).inc();
    }
}

/// Observe one tick's duration
pub fn observe_tick_duration(seconds: f64) {
    if let Some(m) = METRICS.get() {
        m.tick_duration.observe(seconds);
    }
}

/// Render all registered metrics in the Prometheus text format
pub fn export_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}
