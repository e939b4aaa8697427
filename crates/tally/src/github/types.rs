//! GitHub API data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::GitHubError;

/// Envelope of every GraphQL response.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl GraphQlError {
    pub fn is_not_found(&self) -> bool {
        self.kind.as_deref() == Some("NOT_FOUND")
    }
}

/// `data` of a repository-scoped query. GitHub returns `null` for a
/// repository that does not exist or is not visible.
#[derive(Debug, Deserialize)]
pub struct RepositoryData<R> {
    pub repository: Option<R>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

impl PageInfo {
    /// Cursor to request next, if there is a next page.
    pub fn next_cursor(self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StargazersRepo {
    pub stargazers: EdgeConnection<StarEdgeRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForksRepo {
    pub forks: NodeConnection<ForkRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestsRepo {
    pub pull_requests: NodeConnection<PullRequestRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuesRepo {
    pub issues: NodeConnection<IssueRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "E: Deserialize<'de>"))]
pub struct EdgeConnection<E> {
    #[serde(default)]
    pub edges: Vec<E>,
    #[serde(default)]
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "N: Deserialize<'de>"))]
pub struct NodeConnection<N> {
    #[serde(default)]
    pub nodes: Vec<N>,
    #[serde(default)]
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarEdgeRaw {
    pub starred_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkRaw {
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRaw {
    pub updated_at: String,
    pub merged_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRaw {
    pub updated_at: String,
    #[serde(default)]
    pub closed: bool,
    pub closed_at: Option<String>,
}

/// One star event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stargazer {
    pub starred_at: DateTime<Utc>,
}

/// One fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fork {
    pub created_at: DateTime<Utc>,
}

/// A merged pull request, keyed for pagination by its last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedPullRequest {
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// An issue, keyed for pagination by its last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Issue {
    pub updated_at: DateTime<Utc>,
    pub closed: bool,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Closed issues must also carry a close date to count as closed.
    pub fn is_closed(&self) -> bool {
        self.closed && self.closed_at.is_some()
    }
}

/// Parse an ISO-8601 timestamp as GitHub emits it.
pub fn parse_github_date(value: &str) -> Result<DateTime<Utc>, GitHubError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GitHubError::InvalidDate {
            value: value.to_string(),
            message: e.to_string(),
        })
}

fn parse_optional_date(value: Option<&str>) -> Result<Option<DateTime<Utc>>, GitHubError> {
    value.map(parse_github_date).transpose()
}

impl TryFrom<StarEdgeRaw> for Stargazer {
    type Error = GitHubError;

    fn try_from(raw: StarEdgeRaw) -> Result<Self, Self::Error> {
        Ok(Self {
            starred_at: parse_github_date(&raw.starred_at)?,
        })
    }
}

impl TryFrom<ForkRaw> for Fork {
    type Error = GitHubError;

    fn try_from(raw: ForkRaw) -> Result<Self, Self::Error> {
        Ok(Self {
            created_at: parse_github_date(&raw.created_at)?,
        })
    }
}

impl TryFrom<PullRequestRaw> for MergedPullRequest {
    type Error = GitHubError;

    fn try_from(raw: PullRequestRaw) -> Result<Self, Self::Error> {
        Ok(Self {
            updated_at: parse_github_date(&raw.updated_at)?,
            merged_at: parse_optional_date(raw.merged_at.as_deref())?,
        })
    }
}

impl TryFrom<IssueRaw> for Issue {
    type Error = GitHubError;

    fn try_from(raw: IssueRaw) -> Result<Self, Self::Error> {
        Ok(Self {
            updated_at: parse_github_date(&raw.updated_at)?,
            closed: raw.closed,
            closed_at: parse_optional_date(raw.closed_at.as_deref())?,
        })
    }
}

/// A single rate limit resource entry from `GET /rate_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResource {
    pub limit: usize,
    pub used: usize,
    pub remaining: usize,
    /// Unix timestamp when the rate limit resets.
    pub reset: i64,
}

impl RateLimitResource {
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimits {
    pub core: RateLimitResource,
    #[serde(default)]
    pub graphql: Option<RateLimitResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimitResponse {
    pub resources: GitHubRateLimits,
}
