//! Monthly metric queries.
//!
//! Every metric is one paginated GraphQL connection walked newest-first
//! through [`collect_window`]. Each page draws its own credential from the
//! pool, so a long walk can move between tokens as quota runs out.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::calendar::TimeWindow;
use crate::platform::{self, IssueCounts, Page, RepoName, RepositoryMetrics, collect_window};

use super::client::GitHubClient;
use super::error::GitHubError;
use super::types::{
    Fork, ForksRepo, Issue, IssuesRepo, MergedPullRequest, PullRequestsRepo, RepositoryData,
    StargazersRepo, Stargazer,
};

pub const PAGE_SIZE: u32 = 100;

const STARGAZERS_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    stargazers(first: $first, after: $after, orderBy: {field: STARRED_AT, direction: DESC}) {
      edges { starredAt }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

const FORKS_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    forks(first: $first, after: $after, orderBy: {field: CREATED_AT, direction: DESC}) {
      nodes { createdAt }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

const MERGED_PULL_REQUESTS_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: $first, after: $after, states: [MERGED], orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes { updatedAt mergedAt }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

const ISSUES_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    issues(first: $first, after: $after, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes { updatedAt closed closedAt }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

impl GitHubClient {
    /// Fetch one page of a repository-scoped connection.
    async fn repository_page<R, T>(
        &self,
        query: &str,
        repo: &RepoName,
        cursor: Option<String>,
        into_page: impl FnOnce(R) -> Result<Page<T>, GitHubError>,
    ) -> Result<Page<T>, GitHubError>
    where
        R: DeserializeOwned,
    {
        let variables = json!({
            "owner": repo.owner,
            "name": repo.name,
            "first": PAGE_SIZE,
            "after": cursor,
        });
        let resource = repo.to_string();
        let data: RepositoryData<R> = self.graphql(query, &variables, &resource).await?;
        let repository = data.repository.ok_or(GitHubError::NotFound(resource))?;
        into_page(repository)
    }

    pub async fn stargazers_page(
        &self,
        repo: &RepoName,
        cursor: Option<String>,
    ) -> Result<Page<Stargazer>, GitHubError> {
        self.repository_page(STARGAZERS_QUERY, repo, cursor, |r: StargazersRepo| {
            let items = r
                .stargazers
                .edges
                .into_iter()
                .map(Stargazer::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, r.stargazers.page_info.next_cursor()))
        })
        .await
    }

    pub async fn forks_page(
        &self,
        repo: &RepoName,
        cursor: Option<String>,
    ) -> Result<Page<Fork>, GitHubError> {
        self.repository_page(FORKS_QUERY, repo, cursor, |r: ForksRepo| {
            let items = r
                .forks
                .nodes
                .into_iter()
                .map(Fork::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, r.forks.page_info.next_cursor()))
        })
        .await
    }

    pub async fn merged_pull_requests_page(
        &self,
        repo: &RepoName,
        cursor: Option<String>,
    ) -> Result<Page<MergedPullRequest>, GitHubError> {
        self.repository_page(
            MERGED_PULL_REQUESTS_QUERY,
            repo,
            cursor,
            |r: PullRequestsRepo| {
                let items = r
                    .pull_requests
                    .nodes
                    .into_iter()
                    .map(MergedPullRequest::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Page::new(items, r.pull_requests.page_info.next_cursor()))
            },
        )
        .await
    }

    pub async fn issues_page(
        &self,
        repo: &RepoName,
        cursor: Option<String>,
    ) -> Result<Page<Issue>, GitHubError> {
        self.repository_page(ISSUES_QUERY, repo, cursor, |r: IssuesRepo| {
            let items = r
                .issues
                .nodes
                .into_iter()
                .map(Issue::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, r.issues.page_info.next_cursor()))
        })
        .await
    }
}

#[async_trait]
impl RepositoryMetrics for GitHubClient {
    async fn stars(&self, repo: &RepoName, window: &TimeWindow) -> platform::Result<i64> {
        let stars = collect_window(
            window,
            |cursor| self.stargazers_page(repo, cursor),
            |s| s.starred_at,
        )
        .await?;
        Ok(stars.len() as i64)
    }

    async fn forks(&self, repo: &RepoName, window: &TimeWindow) -> platform::Result<i64> {
        let forks = collect_window(
            window,
            |cursor| self.forks_page(repo, cursor),
            |f| f.created_at,
        )
        .await?;
        Ok(forks.len() as i64)
    }

    /// Merge dates cannot be sorted on upstream, so the walk runs on
    /// `updatedAt` (never earlier than `mergedAt`) from the window start
    /// onward and merges are counted afterwards.
    async fn merged_pull_requests(
        &self,
        repo: &RepoName,
        window: &TimeWindow,
    ) -> platform::Result<i64> {
        let touched = collect_window(
            &TimeWindow::open_ended(window.start),
            |cursor| self.merged_pull_requests_page(repo, cursor),
            |pr| pr.updated_at,
        )
        .await?;
        let merged = touched
            .iter()
            .filter(|pr| pr.merged_at.is_some_and(|at| window.contains(at)))
            .count();
        Ok(merged as i64)
    }

    async fn issues(&self, repo: &RepoName, window: &TimeWindow) -> platform::Result<IssueCounts> {
        let issues = collect_window(
            window,
            |cursor| self.issues_page(repo, cursor),
            |i| i.updated_at,
        )
        .await?;
        Ok(IssueCounts {
            total: issues.len() as i64,
            closed: issues.iter().filter(|i| i.is_closed()).count() as i64,
        })
    }
}
