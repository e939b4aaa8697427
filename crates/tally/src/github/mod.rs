//! GitHub GraphQL client for monthly engagement metrics.
//!
//! - [`error`] - Error types for GitHub API operations
//! - [`types`] - GraphQL payloads and metric edges
//! - [`client`] - Credentialed requests, quota feedback, status mapping
//! - [`metrics`] - Per-metric queries and the [`RepositoryMetrics`] impl
//!
//! [`RepositoryMetrics`]: crate::platform::RepositoryMetrics

mod client;
mod error;
mod metrics;
mod types;

pub use client::{
    DEFAULT_API_URL, DEFAULT_GRAPHQL_URL, GitHubClient, GitHubClientConfig, parse_quota_headers,
};
pub use error::{GitHubError, is_secondary_rate_limit};
pub use metrics::PAGE_SIZE;
pub use types::{Fork, Issue, MergedPullRequest, Stargazer, parse_github_date};
