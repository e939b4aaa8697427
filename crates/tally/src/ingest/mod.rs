//! Monthly engagement ingestion.
//!
//! [`MonthlyIngestor`] runs one batch: it creates the month's rows, selects
//! pending ones, and fetches their metrics chunk by chunk. [`Scheduler`]
//! repeats batches and sleeps between them according to [`decide`].

mod engine;
mod error;
mod progress;
mod scheduler;
#[cfg(test)]
mod testing;
mod types;

pub use engine::{MonthlyIngestor, apply_counts};
pub use error::IngestError;
pub use progress::{IngestProgress, ProgressCallback, emit};
pub use scheduler::{
    DEFAULT_ERROR_BACKOFF, Decision, Scheduler, SchedulerOptions, SleepReason, decide,
};
pub use types::{
    BatchOutcome, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, IngestOptions, RepositoryOutcome,
    RepositoryReport,
};
