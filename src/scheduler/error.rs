//! Error types for the scheduler module

use std::fmt;

use crate::storage::StorageError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// The due-feed selection query failed; the tick is skipped and
    /// retried on the next period
    SelectionFailed {
        refresh_rate_seconds: u64,
        reason: String,
    },

    /// A feed's processing pipeline failed
    FeedProcessingFailed {
        feed_id: String,
        url: String,
        reason: String,
    },

    /// Persisting a schedule-related update failed
    PersistFailed {
        feed_id: String,
        operation: String,
        reason: String,
    },

    /// Backfill batch failed
    BackfillFailed {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectionFailed {
                refresh_rate_seconds,
                reason,
            } => {
                write!(
                    f,
                    "Due-feed selection failed for {}s interval: {}",
                    refresh_rate_seconds, reason
                )
            }
            Self::FeedProcessingFailed {
                feed_id,
                url,
                reason,
            } => {
                write!(f, "Processing feed {} ({}) failed: {}", feed_id, url, reason)
            }
            Self::PersistFailed {
                feed_id,
                operation,
                reason,
            } => {
                write!(
                    f,
                    "Persisting '{}' for feed {} failed: {}",
                    operation, feed_id, reason
                )
            }
            Self::BackfillFailed { reason } => {
                write!(f, "Slot offset backfill failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a selection failure from a storage error
    pub fn selection_failed(refresh_rate_seconds: u64, source: &StorageError) -> Self {
        Self::SelectionFailed {
            refresh_rate_seconds,
            reason: source.to_string(),
        }
    }

    /// Create a feed processing failure
    pub fn feed_processing_failed(
        feed_id: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::FeedProcessingFailed {
            feed_id: feed_id.into(),
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a persist failure
    pub fn persist_failed(
        feed_id: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PersistFailed {
            feed_id: feed_id.into(),
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable (the next tick may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SelectionFailed { .. }
                | Self::FeedProcessingFailed { .. }
                | Self::BackfillFailed { .. }
        )
    }
}
