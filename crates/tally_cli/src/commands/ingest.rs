use std::sync::Arc;

use chrono::{Datelike, Utc};
use console::style;
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use tally::github::GitHubClient;
use tally::http::ReqwestTransport;
use tally::ingest::{BatchOutcome, MonthlyIngestor, Scheduler};
use tally::insight::SeaOrmInsightStore;
use tally::platform::TokenPool;

use crate::IngestAction;
use crate::config::Config;
use crate::progress::ProgressReporter;

pub(crate) async fn handle_ingest(
    action: IngestAction,
    config: &Config,
    db: DatabaseConnection,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let tokens = Arc::new(TokenPool::new(
        &config.github.tokens,
        config.github.allow_anonymous,
    ));
    if tokens.is_empty() && !tokens.allows_anonymous() {
        return Err(
            "No GitHub tokens configured. Set github.tokens or GITHUB_TOKENS, \
             or enable github.allow_anonymous."
                .into(),
        );
    }
    tracing::info!(
        tokens = tokens.len(),
        anonymous = tokens.allows_anonymous(),
        "Token pool ready"
    );

    let transport = ReqwestTransport::with_timeout(config.request_timeout())?;
    let client = GitHubClient::new(Arc::new(transport), Arc::clone(&tokens), config.client_config());
    let reporter = Arc::new(ProgressReporter::new());

    match action {
        IngestAction::Monthly {
            batch_size,
            chunk_size,
        } => {
            let ingestor = MonthlyIngestor::new(
                Arc::new(SeaOrmInsightStore::new(db)),
                Arc::new(client),
                config.ingest_options(batch_size, chunk_size),
            )
            .with_progress(reporter.as_callback());

            Scheduler::new(ingestor, tokens, config.scheduler_options())
                .run(cancel)
                .await;
            reporter.finish();
        }
        IngestAction::Once {
            month,
            year,
            batch_size,
            chunk_size,
        } => {
            let now = Utc::now();
            let month = month.unwrap_or_else(|| now.month());
            let year = year.unwrap_or_else(|| now.year());

            let ingestor = MonthlyIngestor::new(
                Arc::new(SeaOrmInsightStore::new(db)),
                Arc::new(client),
                config.ingest_options(batch_size, chunk_size),
            )
            .with_progress(reporter.as_callback());

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    reporter.finish();
                    return Err("Interrupted".into());
                }
                result = ingestor.run_batch(month, year) => result,
            };
            reporter.finish();
            print_summary(year, month, &result?);
        }
    }

    Ok(())
}

fn print_summary(year: i32, month: u32, outcome: &BatchOutcome) {
    println!(
        "{} {year}-{month:02}: {} selected, {} updated ({} completed), {} unavailable, {} failed, {} throttled",
        style("✓").green(),
        outcome.selected,
        outcome.updated,
        outcome.completed,
        outcome.unavailable,
        outcome.failed,
        outcome.throttled,
    );
    if !outcome.done {
        println!("  More rows are pending; run again to continue.");
    }
}
