use console::style;
use sea_orm::DatabaseConnection;
use tabled::Tabled;

use tally::entity::repository_monthly_insight::Model as InsightModel;
use tally::entity::tracked_repository::Model as TrackedModel;
use tally::insight;
use tally::platform::RepoName;

use crate::RepoAction;

pub(crate) async fn handle_repo(
    action: RepoAction,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RepoAction::Add { repos } => {
            let names = parse_names(&repos)?;
            for name in &names {
                let tracked = insight::track_repository(db, name).await?;
                println!("{} tracking {}", style("✓").green(), tracked.full_name());
            }
        }
        RepoAction::List => {
            let rows: Vec<RepositoryRow> = insight::list_repositories(db)
                .await?
                .iter()
                .map(RepositoryRow::from)
                .collect();
            if rows.is_empty() {
                println!("No repositories tracked. Add one with: tally repo add owner/name");
            } else {
                print_table(rows);
            }
        }
        RepoAction::Skip { repo } => {
            let tracked = insight::set_skipped(db, &repo.parse()?, true).await?;
            println!("{} skipping {}", style("-").yellow(), tracked.full_name());
        }
        RepoAction::Unskip { repo } => {
            let tracked = insight::set_skipped(db, &repo.parse()?, false).await?;
            println!("{} resumed {}", style("✓").green(), tracked.full_name());
        }
        RepoAction::Show { repo } => {
            let name: RepoName = repo.parse()?;
            let tracked = insight::find_repository(db, &name)
                .await?
                .ok_or_else(|| format!("{name} is not tracked"))?;
            let rows: Vec<MonthRow> = insight::find_for_repository(db, &tracked)
                .await?
                .iter()
                .map(MonthRow::from)
                .collect();
            if tracked.skipped {
                println!("{} {} is skipped", style("!").yellow(), tracked.full_name());
            }
            if rows.is_empty() {
                println!("No monthly rows yet for {}", tracked.full_name());
            } else {
                print_table(rows);
            }
        }
    }

    Ok(())
}

/// Parse every name before touching the database so a typo adds nothing.
fn parse_names(repos: &[String]) -> Result<Vec<RepoName>, Box<dyn std::error::Error>> {
    repos
        .iter()
        .map(|r| r.parse::<RepoName>().map_err(Into::into))
        .collect()
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{}", table);
}

#[derive(Tabled)]
struct RepositoryRow {
    #[tabled(rename = "Repository")]
    repository: String,
    #[tabled(rename = "Skipped")]
    skipped: bool,
    #[tabled(rename = "Tracked Since")]
    created_at: String,
}

impl From<&TrackedModel> for RepositoryRow {
    fn from(model: &TrackedModel) -> Self {
        Self {
            repository: model.full_name(),
            skipped: model.skipped,
            created_at: model.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Tabled)]
struct MonthRow {
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "Stars")]
    stars: String,
    #[tabled(rename = "Forks")]
    forks: String,
    #[tabled(rename = "Merged PRs")]
    merged_prs: String,
    #[tabled(rename = "Issues")]
    issues: String,
    #[tabled(rename = "Closed")]
    closed_issues: String,
    #[tabled(rename = "Complete")]
    complete: bool,
    #[tabled(rename = "Last Ingested")]
    last_ingested_at: String,
}

fn count(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl From<&InsightModel> for MonthRow {
    fn from(model: &InsightModel) -> Self {
        Self {
            month: format!("{}-{:02}", model.year, model.month),
            stars: count(model.stars),
            forks: count(model.forks),
            merged_prs: count(model.merged_prs),
            issues: count(model.issues),
            closed_issues: count(model.closed_issues),
            complete: model.is_complete(),
            last_ingested_at: model
                .last_ingested_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names_rejects_the_whole_list_on_one_bad_name() {
        let ok = parse_names(&["a/b".to_string(), "c/d/".to_string()]).unwrap();
        assert_eq!(ok, vec![RepoName::new("a", "b"), RepoName::new("c", "d")]);

        assert!(parse_names(&["a/b".to_string(), "nope".to_string()]).is_err());
    }

    #[test]
    fn count_renders_missing_as_dash() {
        assert_eq!(count(None), "-");
        assert_eq!(count(Some(12)), "12");
    }
}
