use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect, SelectTwo, sea_query::NullOrdering,
};

use crate::entity::repository_monthly_insight::{Column, Entity as MonthlyInsight, Model};
use crate::entity::tracked_repository::{
    Column as TrackedColumn, Entity as TrackedRepository, Model as TrackedModel,
};
use crate::platform::RepoName;

use super::errors::Result;

/// An incomplete insight row together with the repository it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInsight {
    pub insight: Model,
    pub repo: RepoName,
}

/// Select up to `limit` incomplete rows not attempted since `before`.
///
/// Oldest months come first so they close out before newer ones; within a
/// month, never-attempted rows lead, then the stalest.
pub async fn find_pending(
    db: &DatabaseConnection,
    before: DateTime<Utc>,
    limit: u64,
) -> Result<Vec<PendingInsight>> {
    let rows = pending_query(before).limit(limit).all(db).await?;

    Ok(rows
        .into_iter()
        .filter_map(|(insight, repo)| {
            repo.map(|r| PendingInsight {
                insight,
                repo: r.repo_name(),
            })
        })
        .collect())
}

fn pending_query(before: DateTime<Utc>) -> SelectTwo<MonthlyInsight, TrackedRepository> {
    MonthlyInsight::find()
        .find_also_related(TrackedRepository)
        .filter(Column::CompletedAt.is_null())
        .filter(TrackedColumn::Skipped.eq(false))
        .filter(
            Condition::any()
                .add(Column::LastIngestedAt.is_null())
                .add(Column::LastIngestedAt.lt(before.fixed_offset())),
        )
        .order_by_asc(Column::Year)
        .order_by_asc(Column::Month)
        .order_by_with_nulls(Column::LastIngestedAt, Order::Asc, NullOrdering::First)
}

/// All rows for one repository, oldest month first.
pub async fn find_for_repository(
    db: &DatabaseConnection,
    repository: &TrackedModel,
) -> Result<Vec<Model>> {
    Ok(MonthlyInsight::find()
        .filter(Column::RepositoryId.eq(repository.id))
        .order_by_asc(Column::Year)
        .order_by_asc(Column::Month)
        .all(db)
        .await?)
}
