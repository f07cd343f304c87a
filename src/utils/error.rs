//! Domain errors for fetching and parsing feeds

use thiserror::Error;

/// Errors while fetching a feed document
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Request to {url} returned status {status}")]
    BadStatus { url: String, status: u16 },

    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// Feed document could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl FetchError {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::Body(_) => true,
            Self::BadStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Parse(_) => false,
        }
    }
}

/// Errors while parsing a feed document into articles
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not a recognizable RSS/Atom document
    #[error("Invalid feed document: {0}")]
    InvalidDocument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_recoverable() {
        let err = FetchError::BadStatus {
            url: "https://example.com/rss".to_string(),
            status: 503,
        };
        assert!(err.is_recoverable());

        let err = FetchError::BadStatus {
            url: "https://example.com/rss".to_string(),
            status: 404,
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_parse_errors_are_not_recoverable() {
        let err = FetchError::Parse(ParseError::InvalidDocument("not xml".to_string()));
        assert!(!err.is_recoverable());
    }
}
