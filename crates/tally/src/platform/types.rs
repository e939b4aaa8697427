use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::calendar::TimeWindow;

use super::errors::{PlatformError, Result};

/// An `owner/name` repository coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

impl RepoName {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoName {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('/');
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(PlatformError::invalid_data(format!(
                "expected owner/name, got '{s}'"
            ))),
        }
    }
}

/// Issue activity inside a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueCounts {
    pub total: i64,
    pub closed: i64,
}

/// Every metric for one repository and one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthlyCounts {
    pub stars: i64,
    pub forks: i64,
    pub merged_prs: i64,
    pub issues: i64,
    pub closed_issues: i64,
}

/// Quota information for one credential.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub limit: usize,
    pub remaining: usize,
    pub used: usize,
    pub reset_at: DateTime<Utc>,
}

/// A source of monthly engagement counts.
///
/// Each call covers exactly one metric so the ingestor can fan the four out
/// concurrently and decide per repository what a failure means.
#[async_trait]
pub trait RepositoryMetrics: Send + Sync {
    async fn stars(&self, repo: &RepoName, window: &TimeWindow) -> Result<i64>;

    async fn forks(&self, repo: &RepoName, window: &TimeWindow) -> Result<i64>;

    async fn merged_pull_requests(&self, repo: &RepoName, window: &TimeWindow) -> Result<i64>;

    async fn issues(&self, repo: &RepoName, window: &TimeWindow) -> Result<IssueCounts>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_parses_owner_and_name() {
        let repo: RepoName = "rust-lang/rust".parse().unwrap();
        assert_eq!(repo, RepoName::new("rust-lang", "rust"));
        assert_eq!(repo.to_string(), "rust-lang/rust");

        let trailing: RepoName = " tokio-rs/tokio/ ".parse().unwrap();
        assert_eq!(trailing, RepoName::new("tokio-rs", "tokio"));
    }

    #[test]
    fn repo_name_rejects_malformed_input() {
        for bad in ["", "rust", "/rust", "rust-lang/", "a/b/c"] {
            let err = bad.parse::<RepoName>().unwrap_err();
            assert!(matches!(err, PlatformError::InvalidData { .. }), "{bad}");
        }
    }
}
