use crate::platform::{MonthlyCounts, RepoName};

/// Maximum insight rows selected per batch.
pub const DEFAULT_BATCH_SIZE: u64 = 1000;

/// Repositories ingested concurrently within a batch.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: u64,
    pub chunk_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl IngestOptions {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// What happened to one repository during a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryOutcome {
    /// All four metrics were fetched and stored.
    Updated {
        counts: MonthlyCounts,
        completed: bool,
    },
    /// The upstream no longer serves the repository; it is now skipped.
    Unavailable { error: String },
    /// A fetch failed; the row is retried on a later day.
    Failed { error: String },
    /// Secondary throttling outlasted the retry budget; the row is retried
    /// on the next batch.
    Throttled { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReport {
    pub repo: RepoName,
    pub year: i32,
    pub month: i32,
    pub outcome: RepositoryOutcome,
}

/// Tally of one `run_batch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// New insight rows created for the target month.
    pub created: u64,
    pub selected: usize,
    pub updated: usize,
    /// Of `updated`, rows whose month was closed out.
    pub completed: usize,
    pub unavailable: usize,
    pub failed: usize,
    pub throttled: usize,
    /// Nothing more is pending until the next day.
    pub done: bool,
}

impl BatchOutcome {
    pub fn record(&mut self, outcome: &RepositoryOutcome) {
        match outcome {
            RepositoryOutcome::Updated { completed, .. } => {
                self.updated += 1;
                if *completed {
                    self.completed += 1;
                }
            }
            RepositoryOutcome::Unavailable { .. } => self.unavailable += 1,
            RepositoryOutcome::Failed { .. } => self.failed += 1,
            RepositoryOutcome::Throttled { .. } => self.throttled += 1,
        }
    }

    /// A short selection means the backlog is drained. Every selected row was
    /// touched, so none of them is eligible again before the next day.
    pub(crate) fn finish(&mut self, batch_size: u64) {
        self.done = (self.selected as u64) < batch_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_clamp_to_one() {
        let options = IngestOptions::default()
            .with_batch_size(0)
            .with_chunk_size(0);
        assert_eq!(options.batch_size, 1);
        assert_eq!(options.chunk_size, 1);
    }

    #[test]
    fn test_record_counts_each_outcome() {
        let mut outcome = BatchOutcome::default();
        outcome.record(&RepositoryOutcome::Updated {
            counts: MonthlyCounts::default(),
            completed: true,
        });
        outcome.record(&RepositoryOutcome::Updated {
            counts: MonthlyCounts::default(),
            completed: false,
        });
        outcome.record(&RepositoryOutcome::Failed { error: "x".into() });
        outcome.record(&RepositoryOutcome::Unavailable { error: "x".into() });
        outcome.record(&RepositoryOutcome::Throttled { error: "x".into() });

        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.unavailable, 1);
        assert_eq!(outcome.throttled, 1);
    }

    #[test]
    fn test_finish() {
        let mut empty = BatchOutcome::default();
        empty.finish(1000);
        assert!(empty.done);

        let mut full = BatchOutcome {
            selected: 1000,
            ..Default::default()
        };
        full.finish(1000);
        assert!(!full.done);

        let mut short = BatchOutcome {
            selected: 10,
            ..Default::default()
        };
        short.finish(1000);
        assert!(short.done);

        let mut throttled = BatchOutcome {
            selected: 10,
            throttled: 1,
            ..Default::default()
        };
        throttled.finish(1000);
        assert!(throttled.done);
    }
}
