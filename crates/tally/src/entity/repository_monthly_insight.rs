//! RepositoryMonthlyInsight entity - one row per tracked repository per month.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calendar::TimeWindow;

/// Engagement counts for one repository in one calendar month.
///
/// Counts stay `NULL` until the first successful ingest. `completed_at` is set
/// once the month has fully elapsed and been ingested; rows with it set are
/// never selected again.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repository_monthly_insights")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub repository_id: Uuid,
    pub year: i32,
    /// 1-12.
    pub month: i32,

    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub merged_prs: Option<i64>,
    pub issues: Option<i64>,
    pub closed_issues: Option<i64>,

    pub completed_at: Option<DateTimeWithTimeZone>,
    /// Advanced on every attempt, successful or not.
    pub last_ingested_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tracked_repository::Entity",
        from = "Column::RepositoryId",
        to = "super::tracked_repository::Column::Id",
        on_delete = "Cascade"
    )]
    TrackedRepository,
}

impl Related<super::tracked_repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackedRepository.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The UTC window covering this row's month.
    pub fn window(&self) -> Option<TimeWindow> {
        let month = u32::try_from(self.month).ok()?;
        TimeWindow::month(self.year, month)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}
