//! Time-bounded regex matching for `MATCHES` filter nodes
//!
//! Patterns come from end users, so matching runs on a worker thread that
//! is joined with a wall-clock deadline. The native engine guarantees
//! linear-time matching, but compilation limits and the hard timeout stay
//! as an outer bound against pathological patterns.

use regex::RegexBuilder;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::FilterError;

/// Default wall-clock budget for a single pattern evaluation
pub const DEFAULT_REGEX_TIMEOUT: Duration = Duration::from_secs(5);

/// Compiled-program size budget; oversized patterns fail compilation
const SIZE_LIMIT: usize = 1 << 20;

/// Test a case-insensitive pattern against a reference string.
///
/// Compilation counts toward the budget. A timeout leaves the worker
/// thread detached; the engine terminates on its own once the match
/// completes.
pub fn test_pattern(
    pattern: &str,
    reference: &str,
    timeout: Duration,
) -> Result<bool, FilterError> {
    let (tx, rx) = mpsc::channel();
    let owned_pattern = pattern.to_string();
    let owned_reference = reference.to_string();

    thread::Builder::new()
        .name("filter-regex".to_string())
        .spawn(move || {
            let result = RegexBuilder::new(&owned_pattern)
                .case_insensitive(true)
                .size_limit(SIZE_LIMIT)
                .dfa_size_limit(SIZE_LIMIT)
                .build()
                .map(|re| re.is_match(&owned_reference));
            // Receiver may be gone if the caller already timed out
            let _ = tx.send(result);
        })
        .map_err(|e| FilterError::WorkerFailed {
            reason: e.to_string(),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(matched)) => Ok(matched),
        Ok(Err(e)) => Err(FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(FilterError::PatternTimeout {
            pattern: pattern.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_match() {
        assert!(test_pattern("breaking", "Breaking News", DEFAULT_REGEX_TIMEOUT).unwrap());
        assert!(!test_pattern("breaking", "quiet day", DEFAULT_REGEX_TIMEOUT).unwrap());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(test_pattern("^RUST", "rustacean", DEFAULT_REGEX_TIMEOUT).unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let err = test_pattern("(unclosed", "anything", DEFAULT_REGEX_TIMEOUT).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        assert!(test_pattern("", "anything", DEFAULT_REGEX_TIMEOUT).unwrap());
    }

    #[test]
    fn test_oversized_pattern_rejected() {
        // Repetition blow-up exceeds the compilation size budget
        let pattern = "(a{1000}){1000}{1000}";
        let result = test_pattern(pattern, "aaaa", Duration::from_secs(1));
        assert!(result.is_err());
    }
}
