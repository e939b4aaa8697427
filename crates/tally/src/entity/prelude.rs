//! Common re-exports for convenient entity usage.

pub use super::repository_monthly_insight::{
    ActiveModel as MonthlyInsightActiveModel, Column as MonthlyInsightColumn,
    Entity as MonthlyInsight, Model as MonthlyInsightModel,
};
pub use super::tracked_repository::{
    ActiveModel as TrackedRepositoryActiveModel, Column as TrackedRepositoryColumn,
    Entity as TrackedRepository, Model as TrackedRepositoryModel,
};
