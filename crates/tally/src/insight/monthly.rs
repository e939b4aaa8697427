use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QuerySelect, QueryTrait, UpdateMany, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::entity::repository_monthly_insight::{
    ActiveModel, Column, Entity as MonthlyInsight, Model,
};
use crate::entity::tracked_repository::{Column as TrackedColumn, Entity as TrackedRepository};

use super::errors::{InsightError, Result};

/// Rows per INSERT; six bound columns each keeps well under SQLite's
/// variable limit.
const INSERT_CHUNK_SIZE: usize = 100;

/// Insert an empty insight row for `year-month` for every tracked,
/// non-skipped repository that lacks one.
///
/// Safe to call on every batch: rows that already exist, or that a
/// concurrent caller inserts first, are left alone. Returns the number of
/// rows inserted.
pub async fn ensure_monthly_rows_exist(
    db: &DatabaseConnection,
    month: u32,
    year: i32,
) -> Result<u64> {
    let month = validate_month(month)?;

    let existing = MonthlyInsight::find()
        .select_only()
        .column(Column::RepositoryId)
        .filter(Column::Year.eq(year))
        .filter(Column::Month.eq(month))
        .into_query();

    let missing: Vec<Uuid> = TrackedRepository::find()
        .select_only()
        .column(TrackedColumn::Id)
        .filter(TrackedColumn::Skipped.eq(false))
        .filter(TrackedColumn::Id.not_in_subquery(existing))
        .into_tuple()
        .all(db)
        .await?;

    if missing.is_empty() {
        return Ok(0);
    }

    let now = Utc::now().fixed_offset();
    let mut inserted = 0u64;

    for chunk in missing.chunks(INSERT_CHUNK_SIZE) {
        let rows = chunk.iter().map(|repository_id| ActiveModel {
            id: Set(Uuid::new_v4()),
            repository_id: Set(*repository_id),
            year: Set(year),
            month: Set(month),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        });

        inserted += MonthlyInsight::insert_many(rows)
            .on_conflict(
                OnConflict::columns([Column::RepositoryId, Column::Year, Column::Month])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    Ok(inserted)
}

fn validate_month(month: u32) -> Result<i32> {
    if (1..=12).contains(&month) {
        Ok(month as i32)
    } else {
        Err(InsightError::InvalidInput {
            message: format!("month must be 1-12, got {month}"),
        })
    }
}

/// Persist every mutable field of `insight`.
///
/// Fails unless exactly one row is updated.
pub async fn update_insight(db: &DatabaseConnection, insight: Model) -> Result<()> {
    let id = insight.id;
    let result = update_statement(insight).exec(db).await?;

    match result.rows_affected {
        1 => Ok(()),
        0 => Err(InsightError::insight_not_found(id)),
        actual => Err(InsightError::UnexpectedRowsAffected {
            expected: 1,
            actual,
        }),
    }
}

fn update_statement(insight: Model) -> UpdateMany<MonthlyInsight> {
    let id = insight.id;
    let mut active: ActiveModel = ActiveModel::from(insight).reset_all();
    active.id = NotSet;
    active.created_at = NotSet;
    active.updated_at = Set(Utc::now().fixed_offset());

    MonthlyInsight::update_many()
        .set(active)
        .filter(Column::Id.eq(id))
}
