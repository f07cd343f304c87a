//! Feed fetching
//!
//! [`ArticleFetcher`] is the port the scheduler consumes; [`HttpFetcher`]
//! implements it over reqwest with rate limiting and bounded retries. The
//! payload carries a content hash of the raw body so unchanged responses
//! can be skipped without re-running identity resolution.

mod parse;

pub use parse::parse_articles;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::models::Article;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry, RetryConfig};

/// One fetched and parsed feed response
#[derive(Debug, Clone)]
pub struct FeedPayload {
    /// SHA256 hex digest of the raw response body
    pub content_hash: String,

    /// Parsed articles in document order (typically newest first)
    pub articles: Vec<Article>,
}

/// Feed fetching contract consumed by the scheduler
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Fetch and parse one feed URL
    async fn fetch(&self, url: &str) -> Result<FeedPayload, FetchError>;
}

/// HTTP fetcher with rate limiting and retry
pub struct HttpFetcher {
    client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Create a fetcher bounded to `requests_per_second`
    pub fn new(
        requests_per_second: u32,
        request_timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(format!("mulgyeol/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        let quota =
            Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            retry,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ArticleFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FeedPayload, FetchError> {
        let bytes = with_retry(&self.retry, || async {
            self.fetch_bytes(url).await.map_err(anyhow::Error::from)
        })
        .await
        .map_err(|e| match e.downcast::<FetchError>() {
            Ok(fetch_error) => fetch_error,
            Err(other) => FetchError::Body(other.to_string()),
        })?;

        let content_hash = hash_body(&bytes);
        let articles = parse_articles(&bytes)?;

        tracing::debug!(
            url = %url,
            articles = articles.len(),
            "Fetched and parsed feed"
        );

        Ok(FeedPayload {
            content_hash,
            articles,
        })
    }
}

/// SHA256 hex digest of a response body
pub fn hash_body(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_body_is_stable() {
        let a = hash_body(b"<rss></rss>");
        let b = hash_body(b"<rss></rss>");
        let c = hash_body(b"<rss><item/></rss>");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fetcher_construction() {
        let fetcher = HttpFetcher::new(5, Duration::from_secs(30), RetryConfig::default());
        assert!(fetcher.is_ok());
    }
}
