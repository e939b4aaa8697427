use thiserror::Error;

use crate::insight::InsightError;
use crate::platform::PlatformError;

/// Errors that abort a batch.
///
/// Per-repository fetch failures are not errors at this level; they are
/// reported as [`RepositoryOutcome`](super::RepositoryOutcome)s.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No credential can serve requests until a quota reset.
    #[error("Credential quota exhausted: {0}")]
    QuotaExhausted(#[source] PlatformError),

    #[error("Storage error: {0}")]
    Store(#[from] InsightError),

    /// A repository task panicked or was cancelled.
    #[error("Ingestion task failed: {0}")]
    Task(String),
}

impl IngestError {
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_))
    }
}
