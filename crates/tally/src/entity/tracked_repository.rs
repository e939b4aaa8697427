//! TrackedRepository entity - repositories whose engagement is ingested monthly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::platform::RepoName;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracked_repositories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owner login (user or organization).
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Skipped repositories get no new monthly rows. Set when the upstream
    /// reports the repository missing or blocked.
    #[sea_orm(default_value = false)]
    pub skipped: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::repository_monthly_insight::Entity")]
    MonthlyInsights,
}

impl Related<super::repository_monthly_insight::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyInsights.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn repo_name(&self) -> RepoName {
        RepoName::new(&self.owner, &self.name)
    }
}
