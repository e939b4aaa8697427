//! Initial migration to create the tally database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_tracked_repositories(manager).await?;
        self.create_monthly_insights(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(RepositoryMonthlyInsights::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(TrackedRepositories::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_tracked_repositories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TrackedRepositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackedRepositories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TrackedRepositories::Owner)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackedRepositories::Name).string().not_null())
                    .col(
                        ColumnDef::new(TrackedRepositories::Skipped)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(TrackedRepositories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TrackedRepositories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracked_repos_owner_name")
                    .table(TrackedRepositories::Table)
                    .col(TrackedRepositories::Owner)
                    .col(TrackedRepositories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_monthly_insights(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RepositoryMonthlyInsights::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::RepositoryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::Year)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::Month)
                            .integer()
                            .not_null(),
                    )
                    // Counts, NULL until first successful ingest
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::Stars)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::Forks)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::MergedPrs)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::Issues)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::ClosedIssues)
                            .big_integer()
                            .null(),
                    )
                    // Progress
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::LastIngestedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RepositoryMonthlyInsights::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monthly_insights_repository")
                            .from(
                                RepositoryMonthlyInsights::Table,
                                RepositoryMonthlyInsights::RepositoryId,
                            )
                            .to(TrackedRepositories::Table, TrackedRepositories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per repository per month
        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_insights_repo_year_month")
                    .table(RepositoryMonthlyInsights::Table)
                    .col(RepositoryMonthlyInsights::RepositoryId)
                    .col(RepositoryMonthlyInsights::Year)
                    .col(RepositoryMonthlyInsights::Month)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Pending-row selection
        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_insights_pending")
                    .table(RepositoryMonthlyInsights::Table)
                    .col(RepositoryMonthlyInsights::CompletedAt)
                    .col(RepositoryMonthlyInsights::Year)
                    .col(RepositoryMonthlyInsights::Month)
                    .col(RepositoryMonthlyInsights::LastIngestedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "tracked_repositories")]
enum TrackedRepositories {
    Table,
    Id,
    Owner,
    Name,
    Skipped,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "repository_monthly_insights")]
enum RepositoryMonthlyInsights {
    Table,
    Id,
    RepositoryId,
    Year,
    Month,
    Stars,
    Forks,
    MergedPrs,
    Issues,
    ClosedIssues,
    CompletedAt,
    LastIngestedAt,
    CreatedAt,
    UpdatedAt,
}
