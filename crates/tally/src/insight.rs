//! Persistence for tracked repositories and their monthly insight rows.
//!
//! Storage operations are free functions over a [`DatabaseConnection`].
//! Ingestion reaches them through the [`InsightStore`] trait so the engine
//! can run against an in-memory store in tests.

mod errors;
mod monthly;
mod query;
mod tracked;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::repository_monthly_insight::Model as InsightModel;

pub use errors::{InsightError, Result};
pub use monthly::{ensure_monthly_rows_exist, update_insight};
pub use query::{PendingInsight, find_for_repository, find_pending};
pub use tracked::{
    find_repository, list_repositories, mark_skipped, set_skipped, track_repository,
};

/// The storage operations the ingestor depends on.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Create missing rows for `year-month`; returns how many were inserted.
    async fn ensure_monthly_rows_exist(&self, month: u32, year: i32) -> Result<u64>;

    async fn find_pending_insights(
        &self,
        before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<PendingInsight>>;

    async fn update_insight(&self, insight: InsightModel) -> Result<()>;

    async fn mark_repository_skipped(&self, repository_id: Uuid) -> Result<()>;
}

/// [`InsightStore`] backed by SeaORM.
#[derive(Debug)]
pub struct SeaOrmInsightStore {
    db: DatabaseConnection,
}

impl SeaOrmInsightStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl InsightStore for SeaOrmInsightStore {
    async fn ensure_monthly_rows_exist(&self, month: u32, year: i32) -> Result<u64> {
        monthly::ensure_monthly_rows_exist(&self.db, month, year).await
    }

    async fn find_pending_insights(
        &self,
        before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<PendingInsight>> {
        query::find_pending(&self.db, before, limit).await
    }

    async fn update_insight(&self, insight: InsightModel) -> Result<()> {
        monthly::update_insight(&self.db, insight).await
    }

    async fn mark_repository_skipped(&self, repository_id: Uuid) -> Result<()> {
        tracked::mark_skipped(&self.db, repository_id).await
    }
}
