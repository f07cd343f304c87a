//! Delivery sinks
//!
//! The scheduler hands (feed, destination, article) tuples that survived
//! identity resolution and the destination's filter to a [`DeliverySink`].
//! Message formatting beyond a generic JSON payload is a consumer concern
//! and stays outside this crate.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Article, DeliveryDestination, FeedRecord};

/// Delivery failures
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Sink configuration is invalid
    #[error("Invalid sink config: {0}")]
    InvalidConfig(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Delivery to {url} returned status {status}: {body}")]
    Rejected {
        url: String,
        status: u16,
        body: String,
    },
}

/// Delivery contract consumed by the scheduler
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver one article to one destination
    async fn deliver(
        &self,
        feed: &FeedRecord,
        destination: &DeliveryDestination,
        article: &Article,
    ) -> Result<(), DeliveryError>;
}

/// Webhook sink configuration
#[derive(Debug, Clone)]
pub struct WebhookSinkConfig {
    /// Optional bearer token
    pub auth_token: Option<String>,

    /// Custom headers added to every request
    pub headers: std::collections::HashMap<String, String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts on failure
    pub max_retries: u32,
}

impl Default for WebhookSinkConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            headers: std::collections::HashMap::new(),
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

/// JSON payload posted to a destination URL
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    feed_id: &'a str,
    feed_url: &'a str,
    destination_id: &'a str,
    article: &'a Article,
}

/// Generic webhook delivery sink: posts articles as JSON to the
/// destination URL, with bounded retries and no retry on client errors.
pub struct WebhookSink {
    config: WebhookSinkConfig,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Create a sink from config
    pub fn new(config: WebhookSinkConfig) -> Result<Self, DeliveryError> {
        if config.timeout_secs == 0 {
            return Err(DeliveryError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DeliveryError::Http)?;

        Ok(Self { config, client })
    }

    /// Create a sink with default settings
    pub fn with_defaults() -> Result<Self, DeliveryError> {
        Self::new(WebhookSinkConfig::default())
    }

    async fn send_with_retry(
        &self,
        url: &str,
        payload: &WebhookPayload<'_>,
    ) -> Result<(), DeliveryError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(2_u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
                tracing::debug!(
                    url = %url,
                    attempt = attempt,
                    "Retrying webhook delivery"
                );
            }

            let mut request = self.client.post(url);

            if let Some(token) = &self.config.auth_token {
                request = request.bearer_auth(token);
            }
            for (key, value) in &self.config.headers {
                request = request.header(key, value);
            }

            match request.json(payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());
                    last_error = Some(DeliveryError::Rejected {
                        url: url.to_string(),
                        status: status.as_u16(),
                        body,
                    });

                    // 4xx will not improve on retry
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(DeliveryError::Http(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| DeliveryError::InvalidConfig("no attempts made".to_string())))
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    async fn deliver(
        &self,
        feed: &FeedRecord,
        destination: &DeliveryDestination,
        article: &Article,
    ) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            feed_id: &feed.id,
            feed_url: &feed.url,
            destination_id: &destination.id,
            article,
        };

        self.send_with_retry(&destination.url, &payload).await?;

        tracing::info!(
            feed_id = %feed.id,
            destination_id = %destination.id,
            "Delivered article"
        );
        Ok(())
    }
}

/// Sink that records deliveries in memory, for tests and dry runs
#[derive(Default)]
pub struct MemorySink {
    deliveries: tokio::sync::Mutex<Vec<RecordedDelivery>>,
}

/// One recorded delivery
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub feed_id: String,
    pub destination_id: String,
    pub article: Article,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All deliveries recorded so far
    pub async fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.lock().await.clone()
    }

    /// Number of recorded deliveries
    pub async fn len(&self) -> usize {
        self.deliveries.lock().await.len()
    }

    /// Whether nothing was delivered
    pub async fn is_empty(&self) -> bool {
        self.deliveries.lock().await.is_empty()
    }
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn deliver(
        &self,
        feed: &FeedRecord,
        destination: &DeliveryDestination,
        article: &Article,
    ) -> Result<(), DeliveryError> {
        self.deliveries.lock().await.push(RecordedDelivery {
            feed_id: feed.id.clone(),
            destination_id: destination.id.clone(),
            article: article.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_rejected() {
        let config = WebhookSinkConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            WebhookSink::new(config),
            Err(DeliveryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_sink_construction() {
        assert!(WebhookSink::with_defaults().is_ok());
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemorySink::new();
        let feed = FeedRecord::new("f1", "https://example.com/rss", "owner");
        let destination = DeliveryDestination::new("d1", "main", "https://hooks.example.com/x");
        let article = Article::new().with_field("title", "hello");

        sink.deliver(&feed, &destination, &article).await.unwrap();

        let deliveries = sink.deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].feed_id, "f1");
        assert_eq!(deliveries[0].article.get("title"), Some("hello"));
    }
}
