//! Batch ingestion of monthly insight rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;

use crate::calendar::{completes_month, start_of_day};
use crate::entity::repository_monthly_insight::Model as InsightModel;
use crate::insight::{InsightStore, PendingInsight};
use crate::platform::{MonthlyCounts, RepositoryMetrics, short_error_message};

use super::error::IngestError;
use super::progress::{IngestProgress, ProgressCallback, emit};
use super::types::{BatchOutcome, IngestOptions, RepositoryOutcome, RepositoryReport};

/// Fills monthly insight rows from a metrics source.
///
/// Each [`run_batch`](Self::run_batch) call creates missing rows for the
/// target month, selects up to `batch_size` rows not yet attempted today,
/// and ingests them `chunk_size` repositories at a time. Chunks run one
/// after another; repositories inside a chunk run concurrently, and the four
/// metrics of one repository are fetched concurrently as well.
pub struct MonthlyIngestor<S, M> {
    store: Arc<S>,
    metrics: Arc<M>,
    options: IngestOptions,
    on_progress: Option<ProgressCallback>,
}

impl<S, M> MonthlyIngestor<S, M>
where
    S: InsightStore + 'static,
    M: RepositoryMetrics + 'static,
{
    pub fn new(store: Arc<S>, metrics: Arc<M>, options: IngestOptions) -> Self {
        Self {
            store,
            metrics,
            options,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    pub(crate) fn emit(&self, event: IngestProgress) {
        emit(self.on_progress.as_ref(), event);
    }

    pub async fn run_batch(&self, month: u32, year: i32) -> Result<BatchOutcome, IngestError> {
        self.run_batch_at(month, year, Utc::now()).await
    }

    /// [`run_batch`](Self::run_batch) with an explicit clock.
    pub async fn run_batch_at(
        &self,
        month: u32,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, IngestError> {
        let created = self.store.ensure_monthly_rows_exist(month, year).await?;
        self.emit(IngestProgress::RowsEnsured {
            year,
            month,
            created,
        });

        let pending = self
            .store
            .find_pending_insights(start_of_day(now), self.options.batch_size)
            .await?;
        self.emit(IngestProgress::BatchSelected {
            selected: pending.len(),
            limit: self.options.batch_size,
        });

        let mut outcome = BatchOutcome {
            created,
            selected: pending.len(),
            ..Default::default()
        };

        for (index, chunk) in pending.chunks(self.options.chunk_size.max(1)).enumerate() {
            self.emit(IngestProgress::ChunkStarted {
                index,
                size: chunk.len(),
            });
            self.run_chunk(chunk, now, &mut outcome).await?;
        }

        outcome.finish(self.options.batch_size);
        self.emit(IngestProgress::BatchComplete {
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    async fn run_chunk(
        &self,
        chunk: &[PendingInsight],
        now: DateTime<Utc>,
        outcome: &mut BatchOutcome,
    ) -> Result<(), IngestError> {
        let mut tasks = JoinSet::new();
        for pending in chunk.iter().cloned() {
            let store = Arc::clone(&self.store);
            let metrics = Arc::clone(&self.metrics);
            let repository = pending.repo.to_string();
            tasks.spawn(async move {
                let result = ingest_repository(store.as_ref(), metrics.as_ref(), pending, now).await;
                (repository, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (repository, result) = joined.map_err(|e| IngestError::Task(e.to_string()))?;
            match result {
                Ok(report) => {
                    outcome.record(&report.outcome);
                    self.report(report);
                }
                Err(err) => {
                    tasks.abort_all();
                    if let IngestError::QuotaExhausted(ref source) = err {
                        self.emit(IngestProgress::QuotaExhausted {
                            repository,
                            error: short_error_message(source),
                        });
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn report(&self, report: RepositoryReport) {
        let repository = report.repo.to_string();
        let event = match report.outcome {
            RepositoryOutcome::Updated { counts, completed } => IngestProgress::RepositoryUpdated {
                repository,
                year: report.year,
                month: report.month,
                counts,
                completed,
            },
            RepositoryOutcome::Unavailable { error } => {
                IngestProgress::RepositoryUnavailable { repository, error }
            }
            RepositoryOutcome::Failed { error } => {
                IngestProgress::RepositoryFailed { repository, error }
            }
            RepositoryOutcome::Throttled { error } => {
                IngestProgress::RepositoryThrottled { repository, error }
            }
        };
        self.emit(event);
    }
}

/// Fetch all four metrics for one row and persist the result.
///
/// The first failing metric cancels its siblings and nothing partial is
/// stored. Exhaustion and storage errors are returned; every other failure
/// becomes a [`RepositoryOutcome`].
pub(crate) async fn ingest_repository<S, M>(
    store: &S,
    metrics: &M,
    pending: PendingInsight,
    now: DateTime<Utc>,
) -> Result<RepositoryReport, IngestError>
where
    S: InsightStore + ?Sized,
    M: RepositoryMetrics + ?Sized,
{
    let PendingInsight { insight, repo } = pending;
    let (year, month) = (insight.year, insight.month);
    let report = |outcome| RepositoryReport {
        repo: repo.clone(),
        year,
        month,
        outcome,
    };

    let Some(window) = insight.window() else {
        store.update_insight(touch(insight, now)).await?;
        return Ok(report(RepositoryOutcome::Failed {
            error: format!("invalid month {year}-{month}"),
        }));
    };

    let fetched = tokio::try_join!(
        metrics.stars(&repo, &window),
        metrics.forks(&repo, &window),
        metrics.merged_pull_requests(&repo, &window),
        metrics.issues(&repo, &window),
    );

    match fetched {
        Ok((stars, forks, merged_prs, issues)) => {
            let counts = MonthlyCounts {
                stars,
                forks,
                merged_prs,
                issues: issues.total,
                closed_issues: issues.closed,
            };
            let updated = apply_counts(insight, counts, now);
            let completed = updated.completed_at.is_some();
            store.update_insight(updated).await?;
            Ok(report(RepositoryOutcome::Updated { counts, completed }))
        }
        Err(err) if err.is_exhaustion() => Err(IngestError::QuotaExhausted(err)),
        Err(err) if err.is_throttled() => {
            store.update_insight(touch(insight, now)).await?;
            Ok(report(RepositoryOutcome::Throttled {
                error: short_error_message(&err),
            }))
        }
        Err(err) if err.is_unavailable() => {
            store.mark_repository_skipped(insight.repository_id).await?;
            store.update_insight(touch(insight, now)).await?;
            Ok(report(RepositoryOutcome::Unavailable {
                error: short_error_message(&err),
            }))
        }
        Err(err) => {
            store.update_insight(touch(insight, now)).await?;
            Ok(report(RepositoryOutcome::Failed {
                error: short_error_message(&err),
            }))
        }
    }
}

/// Write fetched counts onto a row.
///
/// `completed_at` is set once, the first time the row is ingested after its
/// month has ended.
pub fn apply_counts(mut insight: InsightModel, counts: MonthlyCounts, now: DateTime<Utc>) -> InsightModel {
    insight.stars = Some(counts.stars);
    insight.forks = Some(counts.forks);
    insight.merged_prs = Some(counts.merged_prs);
    insight.issues = Some(counts.issues);
    insight.closed_issues = Some(counts.closed_issues);

    let month_ended = u32::try_from(insight.month)
        .is_ok_and(|month| completes_month(insight.year, month, now));
    if month_ended && insight.completed_at.is_none() {
        insight.completed_at = Some(now.fixed_offset());
    }

    touch(insight, now)
}

fn touch(mut insight: InsightModel, now: DateTime<Utc>) -> InsightModel {
    insight.last_ingested_at = Some(now.fixed_offset());
    insight
}
