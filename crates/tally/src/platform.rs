//! Upstream-agnostic building blocks for metric collection.
//!
//! The ingestion engine talks to a metrics source through
//! [`RepositoryMetrics`] and only inspects errors through the
//! [`PlatformError`] classifiers, so the GitHub client is one implementation
//! among possible others.

mod errors;
mod pagination;
mod rate_limit;
mod token_pool;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use pagination::{Page, collect_window};
pub use rate_limit::{ApiRateLimiter, GITHUB_DEFAULT_RPS};
pub use token_pool::{
    Credential, INITIAL_QUOTA, NoCredentialAvailable, TokenPool, TokenSnapshot,
};
pub use types::{IssueCounts, MonthlyCounts, RateLimitInfo, RepoName, RepositoryMetrics};

impl From<NoCredentialAvailable> for PlatformError {
    fn from(_: NoCredentialAvailable) -> Self {
        PlatformError::NoCredentialAvailable
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_platform_error_display() {
        assert_eq!(
            PlatformError::not_found("org/repo").to_string(),
            "Not found: org/repo"
        );
        assert_eq!(
            PlatformError::QuotaExhausted { reset_at: None }.to_string(),
            "Rate limit exhausted"
        );

        let reset_at = Utc::now();
        assert!(
            PlatformError::QuotaExhausted {
                reset_at: Some(reset_at)
            }
            .to_string()
            .contains("Resets at")
        );
    }

    #[test]
    fn test_classifiers() {
        let exhausted: PlatformError = NoCredentialAvailable.into();
        assert!(exhausted.is_exhaustion());
        assert!(PlatformError::QuotaExhausted { reset_at: None }.is_exhaustion());

        assert!(PlatformError::not_found("x").is_unavailable());
        assert!(PlatformError::access_blocked("x").is_unavailable());

        let throttled = PlatformError::Throttled {
            message: "slow down".into(),
        };
        assert!(throttled.is_throttled());
        assert!(!throttled.is_exhaustion());

        for other in [
            PlatformError::api("bad"),
            PlatformError::network("reset"),
            PlatformError::invalid_data("date"),
        ] {
            assert!(!other.is_exhaustion());
            assert!(!other.is_unavailable());
            assert!(!other.is_throttled());
        }
    }

    #[test]
    fn test_short_error_message_takes_first_line() {
        let err = PlatformError::api("line one\nline two");
        assert_eq!(short_error_message(&err), "API error: line one");
    }
}
