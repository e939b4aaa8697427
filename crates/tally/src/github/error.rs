//! GitHub API error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::HttpError;
use crate::platform::{NoCredentialAvailable, PlatformError};

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("No GitHub credential available")]
    NoCredentialAvailable,

    #[error("Rate limit exhausted. Resets at {}", fmt_reset(.reset_at))]
    QuotaExhausted { reset_at: Option<DateTime<Utc>> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access blocked: {0}")]
    AccessBlocked(String),

    #[error("Secondary rate limit hit: {0}")]
    TooManyRequests(String),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] HttpError),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Invalid date '{value}': {message}")]
    InvalidDate { value: String, message: String },
}

fn fmt_reset(reset_at: &Option<DateTime<Utc>>) -> String {
    reset_at.map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339())
}

impl From<NoCredentialAvailable> for GitHubError {
    fn from(_: NoCredentialAvailable) -> Self {
        GitHubError::NoCredentialAvailable
    }
}

/// Secondary throttling is the only error worth retrying inline.
pub fn is_secondary_rate_limit(e: &GitHubError) -> bool {
    matches!(e, GitHubError::TooManyRequests(_))
}

impl From<GitHubError> for PlatformError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::NoCredentialAvailable => PlatformError::NoCredentialAvailable,
            GitHubError::QuotaExhausted { reset_at } => PlatformError::QuotaExhausted { reset_at },
            GitHubError::NotFound(resource) => PlatformError::not_found(resource),
            GitHubError::AccessBlocked(resource) => PlatformError::access_blocked(resource),
            GitHubError::TooManyRequests(message) => PlatformError::Throttled { message },
            GitHubError::Transport(e) => PlatformError::network(e.to_string()),
            e @ GitHubError::Status { .. } => PlatformError::api(e.to_string()),
            e @ GitHubError::GraphQl(_) => PlatformError::api(e.to_string()),
            e @ (GitHubError::Decode(_) | GitHubError::InvalidDate { .. }) => {
                PlatformError::invalid_data(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_secondary_rate_limit() {
        assert!(is_secondary_rate_limit(&GitHubError::TooManyRequests(
            "slow down".into()
        )));
        assert!(!is_secondary_rate_limit(&GitHubError::QuotaExhausted {
            reset_at: None
        }));
        assert!(!is_secondary_rate_limit(&GitHubError::NotFound(
            "a/b".into()
        )));
    }

    #[test]
    fn test_github_error_to_platform_error() {
        let cases: Vec<(GitHubError, fn(&PlatformError) -> bool)> = vec![
            (GitHubError::NoCredentialAvailable, PlatformError::is_exhaustion),
            (
                GitHubError::QuotaExhausted {
                    reset_at: Some(Utc::now()),
                },
                PlatformError::is_exhaustion,
            ),
            (
                GitHubError::NotFound("a/b".into()),
                PlatformError::is_unavailable,
            ),
            (
                GitHubError::AccessBlocked("a/b".into()),
                PlatformError::is_unavailable,
            ),
            (
                GitHubError::TooManyRequests("x".into()),
                PlatformError::is_throttled,
            ),
        ];

        for (err, check) in cases {
            let rendered = err.to_string();
            let platform: PlatformError = err.into();
            assert!(check(&platform), "{rendered} -> {platform:?}");
        }

        let decode: PlatformError = GitHubError::Decode("eof".into()).into();
        assert!(matches!(decode, PlatformError::InvalidData { .. }));

        let status: PlatformError = GitHubError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(status, PlatformError::Api { .. }));

        let transport: PlatformError =
            GitHubError::Transport(HttpError::Transport("reset".into())).into();
        assert!(matches!(transport, PlatformError::Network { .. }));
    }
}
