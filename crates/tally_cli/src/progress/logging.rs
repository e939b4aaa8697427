use tally::ingest::IngestProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: IngestProgress) {
        match event {
            IngestProgress::RowsEnsured {
                year,
                month,
                created,
            } => {
                if created > 0 {
                    tracing::info!(year, month, created, "Created monthly rows");
                } else {
                    tracing::debug!(year, month, "Monthly rows already present");
                }
            }

            IngestProgress::BatchSelected { selected, limit } => {
                tracing::info!(selected, limit, "Selected pending rows");
            }

            IngestProgress::ChunkStarted { index, size } => {
                tracing::debug!(chunk = index, size, "Ingesting chunk");
            }

            IngestProgress::RepositoryUpdated {
                repository,
                year,
                month,
                counts,
                completed,
            } => {
                tracing::debug!(
                    repo = %repository,
                    year,
                    month,
                    stars = counts.stars,
                    forks = counts.forks,
                    merged_prs = counts.merged_prs,
                    issues = counts.issues,
                    closed_issues = counts.closed_issues,
                    completed,
                    "Updated"
                );
            }

            IngestProgress::RepositoryUnavailable { repository, error } => {
                tracing::warn!(repo = %repository, error = %error, "Repository unavailable, skipping");
            }

            IngestProgress::RepositoryFailed { repository, error } => {
                tracing::warn!(repo = %repository, error = %error, "Ingest failed");
            }

            IngestProgress::RepositoryThrottled { repository, error } => {
                tracing::warn!(repo = %repository, error = %error, "Throttled, will retry");
            }

            IngestProgress::QuotaExhausted { repository, error } => {
                tracing::warn!(repo = %repository, error = %error, "Token quota exhausted");
            }

            IngestProgress::BatchComplete { outcome } => {
                tracing::info!(
                    selected = outcome.selected,
                    updated = outcome.updated,
                    completed = outcome.completed,
                    unavailable = outcome.unavailable,
                    failed = outcome.failed,
                    throttled = outcome.throttled,
                    done = outcome.done,
                    "Batch complete"
                );
            }

            IngestProgress::BatchFailed { error } => {
                tracing::error!(error = %error, "Batch failed");
            }

            IngestProgress::Sleeping {
                reason,
                duration,
                until,
            } => {
                tracing::info!(reason = %reason, secs = duration.as_secs(), until = %until, "Sleeping");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
