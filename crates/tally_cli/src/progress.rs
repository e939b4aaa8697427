//! Progress reporting for ingestion.
//!
//! - Interactive mode (TTY): a progress bar per batch using indicatif
//! - Logging mode (non-TTY): structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use tally::ingest::{IngestProgress, ProgressCallback};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    Interactive(InteractiveReporter),
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    pub fn handle(&self, event: IngestProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| reporter.handle(event))
    }

    /// Clear any bars still on screen (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
