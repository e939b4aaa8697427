//! In-memory store and scripted metrics for ingestion tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use uuid::Uuid;

use crate::calendar::TimeWindow;
use crate::entity::repository_monthly_insight::Model as InsightModel;
use crate::entity::tracked_repository::Model as TrackedModel;
use crate::insight::{InsightError, InsightStore, PendingInsight, Result as StoreResult};
use crate::platform::{IssueCounts, PlatformError, RepoName, RepositoryMetrics, Result};

pub(crate) fn insight_row(year: i32, month: i32) -> InsightModel {
    insight_row_for(Uuid::new_v4(), year, month)
}

pub(crate) fn insight_row_for(repository_id: Uuid, year: i32, month: i32) -> InsightModel {
    let now = Utc::now().fixed_offset();
    InsightModel {
        id: Uuid::new_v4(),
        repository_id,
        year,
        month,
        stars: None,
        forks: None,
        merged_prs: None,
        issues: None,
        closed_issues: None,
        completed_at: None,
        last_ingested_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Repositories are named `owner/repo-<n>` in creation order.
#[derive(Default)]
pub(crate) struct MemoryStore {
    repositories: Mutex<Vec<TrackedModel>>,
    insights: Mutex<Vec<InsightModel>>,
    fail_updates: bool,
}

impl MemoryStore {
    pub(crate) fn with_repositories(count: usize) -> Self {
        let now = Utc::now().fixed_offset();
        let repositories = (0..count)
            .map(|i| TrackedModel {
                id: Uuid::new_v4(),
                owner: "owner".to_string(),
                name: format!("repo-{i}"),
                skipped: false,
                created_at: now,
                updated_at: now,
            })
            .collect();
        Self {
            repositories: Mutex::new(repositories),
            ..Default::default()
        }
    }

    pub(crate) fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub(crate) fn repositories(&self) -> Vec<TrackedModel> {
        self.repositories.lock().unwrap().clone()
    }

    pub(crate) fn repository(&self, name: &str) -> Option<TrackedModel> {
        self.repositories().into_iter().find(|r| r.name == name)
    }

    pub(crate) fn insights(&self) -> Vec<InsightModel> {
        self.insights.lock().unwrap().clone()
    }

    pub(crate) fn insight(&self, year: i32, month: i32) -> Option<InsightModel> {
        self.insights()
            .into_iter()
            .find(|i| i.year == year && i.month == month)
    }

    pub(crate) fn insight_for(&self, name: &str) -> Option<InsightModel> {
        let repository = self.repository(name)?;
        self.insights()
            .into_iter()
            .find(|i| i.repository_id == repository.id)
    }

    pub(crate) fn insert_insight(&self, insight: InsightModel) {
        self.insights.lock().unwrap().push(insight);
    }
}

#[async_trait]
impl InsightStore for MemoryStore {
    async fn ensure_monthly_rows_exist(&self, month: u32, year: i32) -> StoreResult<u64> {
        let month = i32::try_from(month)
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| InsightError::InvalidInput {
                message: format!("month {month}"),
            })?;

        let repositories = self.repositories();
        let mut insights = self.insights.lock().unwrap();
        let mut created = 0;
        for repository in repositories.iter().filter(|r| !r.skipped) {
            let exists = insights
                .iter()
                .any(|i| i.repository_id == repository.id && i.year == year && i.month == month);
            if !exists {
                insights.push(insight_row_for(repository.id, year, month));
                created += 1;
            }
        }
        Ok(created)
    }

    async fn find_pending_insights(
        &self,
        before: DateTime<Utc>,
        limit: u64,
    ) -> StoreResult<Vec<PendingInsight>> {
        let names: HashMap<Uuid, TrackedModel> = self
            .repositories()
            .into_iter()
            .filter(|r| !r.skipped)
            .map(|r| (r.id, r))
            .collect();

        let mut pending: Vec<InsightModel> = self
            .insights()
            .into_iter()
            .filter(|i| i.completed_at.is_none())
            .filter(|i| names.contains_key(&i.repository_id))
            .filter(|i| i.last_ingested_at.is_none_or(|at| at < before.fixed_offset()))
            .collect();
        pending.sort_by_key(|i| (i.year, i.month, i.last_ingested_at));

        Ok(pending
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .filter_map(|insight| {
                let repo = names.get(&insight.repository_id)?.repo_name();
                Some(PendingInsight { insight, repo })
            })
            .collect())
    }

    async fn update_insight(&self, insight: InsightModel) -> StoreResult<()> {
        if self.fail_updates {
            return Err(DbErr::Custom("update refused".into()).into());
        }
        let mut insights = self.insights.lock().unwrap();
        let slot = insights
            .iter_mut()
            .find(|i| i.id == insight.id)
            .ok_or_else(|| InsightError::insight_not_found(insight.id))?;
        *slot = insight;
        Ok(())
    }

    async fn mark_repository_skipped(&self, repository_id: Uuid) -> StoreResult<()> {
        let mut repositories = self.repositories.lock().unwrap();
        if let Some(repository) = repositories.iter_mut().find(|r| r.id == repository_id) {
            repository.skipped = true;
        }
        Ok(())
    }
}

/// Returns fixed counts, or an injected error for chosen repositories.
#[derive(Default)]
pub(crate) struct FakeMetrics {
    failures: HashMap<String, fn() -> PlatformError>,
    windows: Mutex<Vec<TimeWindow>>,
}

impl FakeMetrics {
    pub(crate) const STARS: i64 = 7;
    pub(crate) const FORKS: i64 = 3;
    pub(crate) const MERGED_PRS: i64 = 2;
    pub(crate) const ISSUES: IssueCounts = IssueCounts { total: 5, closed: 4 };

    pub(crate) fn failing(mut self, repo: &str, error: fn() -> PlatformError) -> Self {
        self.failures.insert(repo.to_string(), error);
        self
    }

    pub(crate) fn windows(&self) -> Vec<TimeWindow> {
        self.windows.lock().unwrap().clone()
    }

    fn check(&self, repo: &RepoName, window: &TimeWindow) -> Result<()> {
        self.windows.lock().unwrap().push(*window);
        match self.failures.get(&repo.to_string()) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RepositoryMetrics for FakeMetrics {
    async fn stars(&self, repo: &RepoName, window: &TimeWindow) -> Result<i64> {
        self.check(repo, window).map(|_| Self::STARS)
    }

    async fn forks(&self, repo: &RepoName, window: &TimeWindow) -> Result<i64> {
        self.check(repo, window).map(|_| Self::FORKS)
    }

    async fn merged_pull_requests(&self, repo: &RepoName, window: &TimeWindow) -> Result<i64> {
        self.check(repo, window).map(|_| Self::MERGED_PRS)
    }

    async fn issues(&self, repo: &RepoName, window: &TimeWindow) -> Result<IssueCounts> {
        self.check(repo, window).map(|_| Self::ISSUES)
    }
}
