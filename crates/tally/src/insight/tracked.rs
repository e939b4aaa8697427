use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::entity::tracked_repository::{ActiveModel, Column, Entity as TrackedRepository, Model};
use crate::platform::RepoName;

use super::errors::{InsightError, Result};

pub async fn find_repository(db: &DatabaseConnection, repo: &RepoName) -> Result<Option<Model>> {
    TrackedRepository::find()
        .filter(Column::Owner.eq(repo.owner.as_str()))
        .filter(Column::Name.eq(repo.name.as_str()))
        .one(db)
        .await
        .map_err(InsightError::from)
}

/// Start tracking `repo`. Returns the existing row if it is already tracked.
pub async fn track_repository(db: &DatabaseConnection, repo: &RepoName) -> Result<Model> {
    if let Some(existing) = find_repository(db, repo).await? {
        return Ok(existing);
    }

    let now = Utc::now().fixed_offset();
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        owner: Set(repo.owner.clone()),
        name: Set(repo.name.clone()),
        skipped: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    };

    TrackedRepository::insert(model)
        .exec_with_returning(db)
        .await
        .map_err(InsightError::from)
}

pub async fn list_repositories(db: &DatabaseConnection) -> Result<Vec<Model>> {
    TrackedRepository::find()
        .order_by_asc(Column::Owner)
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(InsightError::from)
}

/// Set or clear the skipped flag on a tracked repository.
pub async fn set_skipped(db: &DatabaseConnection, repo: &RepoName, skipped: bool) -> Result<Model> {
    let existing = find_repository(db, repo)
        .await?
        .ok_or_else(|| InsightError::repository_not_found(&repo.to_string()))?;

    mark_skipped_as(db, existing.id, skipped).await?;

    Ok(Model {
        skipped,
        ..existing
    })
}

/// Exclude a repository from future monthly rows.
pub async fn mark_skipped(db: &DatabaseConnection, repository_id: Uuid) -> Result<()> {
    mark_skipped_as(db, repository_id, true).await
}

async fn mark_skipped_as(db: &DatabaseConnection, repository_id: Uuid, skipped: bool) -> Result<()> {
    let result = TrackedRepository::update_many()
        .col_expr(Column::Skipped, Expr::value(skipped))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(Column::Id.eq(repository_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(InsightError::NotFound {
            context: format!("repository id={repository_id}"),
        });
    }
    Ok(())
}
