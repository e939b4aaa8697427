//! Progress events emitted while ingesting.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::platform::MonthlyCounts;

use super::scheduler::SleepReason;
use super::types::BatchOutcome;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum IngestProgress {
    /// Missing rows for the target month were created.
    RowsEnsured { year: i32, month: u32, created: u64 },

    /// Pending rows were selected for this batch.
    BatchSelected { selected: usize, limit: u64 },

    /// A chunk of repositories is about to be fetched concurrently.
    ChunkStarted { index: usize, size: usize },

    RepositoryUpdated {
        repository: String,
        year: i32,
        month: i32,
        counts: MonthlyCounts,
        completed: bool,
    },

    /// Marked skipped after the upstream reported it missing or blocked.
    RepositoryUnavailable { repository: String, error: String },

    RepositoryFailed { repository: String, error: String },

    RepositoryThrottled { repository: String, error: String },

    /// Credentials ran out; the remainder of the batch was abandoned.
    QuotaExhausted { repository: String, error: String },

    BatchComplete { outcome: BatchOutcome },

    /// A batch failed for a reason other than quota.
    BatchFailed { error: String },

    Sleeping {
        reason: SleepReason,
        duration: Duration,
        until: DateTime<Utc>,
    },
}

/// Callback for progress updates during ingestion.
pub type ProgressCallback = Box<dyn Fn(IngestProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: IngestProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
