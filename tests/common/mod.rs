//! Shared fixtures for integration tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use mulgyeol::fetch::{ArticleFetcher, FeedPayload};
use mulgyeol::models::{Article, DeliveryDestination, FeedRecord};
use mulgyeol::storage::{FeedCondition, FeedStore, StorageError};
use mulgyeol::utils::error::FetchError;

/// Build a flattened article from (field, value) pairs
pub fn article(fields: &[(&str, &str)]) -> Article {
    let mut article = Article::new();
    for (name, value) in fields {
        article.set(*name, *value);
    }
    article
}

/// Build an enabled feed with one active destination
pub fn feed(id: &str, url: &str, rate_seconds: u64, slot_offset_ms: Option<u64>) -> FeedRecord {
    let mut feed = FeedRecord::new(id, url, "owner-1");
    feed.refresh_rate_seconds = rate_seconds;
    feed.user_refresh_rate_seconds = Some(rate_seconds);
    feed.slot_offset_ms = slot_offset_ms;
    feed.destinations.push(DeliveryDestination::new(
        format!("{id}-dest"),
        "main",
        "https://hooks.example.com/endpoint",
    ));
    feed
}

/// Programmable fetcher: payloads keyed by URL, with a call counter
#[derive(Default)]
pub struct MockFetcher {
    payloads: Mutex<HashMap<String, FeedPayload>>,
    failures: Mutex<HashMap<String, ()>>,
    calls: AtomicU32,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `articles` for `url`; the content hash changes with `version`
    pub async fn set_payload(&self, url: &str, version: u32, articles: Vec<Article>) {
        self.payloads.lock().await.insert(
            url.to_string(),
            FeedPayload {
                content_hash: format!("{url}-v{version}"),
                articles,
            },
        );
        self.failures.lock().await.remove(url);
    }

    /// Make fetches for `url` fail
    pub async fn set_failure(&self, url: &str) {
        self.failures.lock().await.insert(url.to_string(), ());
    }

    /// Number of fetch calls served
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FeedPayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failures.lock().await.contains_key(url) {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: 503,
            });
        }

        self.payloads
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::BadStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Feed store whose queries always fail
pub struct FailingFeedStore;

#[async_trait]
impl FeedStore for FailingFeedStore {
    async fn find_matching(
        &self,
        _condition: &FeedCondition,
    ) -> Result<Vec<FeedRecord>, StorageError> {
        Err(StorageError::unavailable("query backend down"))
    }

    async fn distinct_refresh_rates(&self) -> Result<Vec<u64>, StorageError> {
        Err(StorageError::unavailable("query backend down"))
    }

    async fn find_missing_slot_offset(
        &self,
        _limit: usize,
    ) -> Result<Vec<FeedRecord>, StorageError> {
        Err(StorageError::unavailable("query backend down"))
    }

    async fn set_slot_offsets(&self, _updates: &[(String, u64)]) -> Result<(), StorageError> {
        Err(StorageError::unavailable("query backend down"))
    }

    async fn apply_refresh_rate(
        &self,
        _feed_id: &str,
        _refresh_rate_seconds: u64,
        _slot_offset_ms: u64,
    ) -> Result<(), StorageError> {
        Err(StorageError::unavailable("query backend down"))
    }

    async fn set_response_hash(&self, _feed_id: &str, _hash: &str) -> Result<(), StorageError> {
        Err(StorageError::unavailable("query backend down"))
    }
}
