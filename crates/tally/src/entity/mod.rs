//! SeaORM entity definitions for the tally database schema.

pub mod prelude;
pub mod repository_monthly_insight;
pub mod tracked_repository;
