//! mulgyeol - Feed Update Scheduling Core
//!
//! A scheduling and delivery engine for large populations of
//! independently-refreshing content feeds: it decides when each feed is
//! due, guarantees at-most-one worker per feed, resolves which fetched
//! items are genuinely new, and gates delivery behind user-configurable
//! filter expressions.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`scheduler`] - Slot-window scheduling, refresh rates, the tick loop
//! - [`lock`] - Distributed processing locks
//! - [`identity`] - Article identity resolution for deduplication
//! - [`filters`] - Filter expression evaluation
//! - [`fetch`] - Feed fetching and parsing
//! - [`delivery`] - Delivery sinks
//! - [`storage`] - Feed and seen-article storage ports
//! - [`models`] - Core data structures and types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mulgyeol::config::Config;
//! use mulgyeol::delivery::MemorySink;
//! use mulgyeol::fetch::HttpFetcher;
//! use mulgyeol::filters::FilterEvaluator;
//! use mulgyeol::lock::{MemoryLockStore, ProcessingLock};
//! use mulgyeol::scheduler::{
//!     RefreshRateResolver, RunnerContext, StaticBenefitsProvider, TierRates, UpdateRunner,
//! };
//! use mulgyeol::storage::{MemoryFeedStore, MemorySeenStore};
//! use mulgyeol::utils::RetryConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let ctx = RunnerContext {
//!         feed_store: Arc::new(MemoryFeedStore::new()),
//!         seen_store: Arc::new(MemorySeenStore::new()),
//!         fetcher: Arc::new(HttpFetcher::new(5, Duration::from_secs(30), RetryConfig::default())?),
//!         sink: Arc::new(MemorySink::new()),
//!         benefits: Arc::new(StaticBenefitsProvider::new()),
//!         lock: ProcessingLock::new(Arc::new(MemoryLockStore::new())),
//!         rate_resolver: RefreshRateResolver::new(TierRates::default(), Vec::new()),
//!         evaluator: FilterEvaluator::default(),
//!     };
//!     let runner = UpdateRunner::new(ctx, config.tick_period(), 16);
//!     // runner.run(shutdown_rx).await;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod delivery;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod identity;
pub mod lock;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::filters::{FilterEvaluator, FilterExpression, FilterOutcome};
    pub use crate::identity::IdentityResolver;
    pub use crate::lock::ProcessingLock;
    pub use crate::models::{Article, FeedRecord, TickStats};
    pub use crate::scheduler::{RefreshRateResolver, SlotWindow, UpdateRunner};
}

// Direct re-exports for convenience
pub use models::{Article, FeedRecord, TickStats};
