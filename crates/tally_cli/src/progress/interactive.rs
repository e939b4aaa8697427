use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tally::ingest::IngestProgress;

#[derive(Default)]
struct ProgressState {
    /// Repositories in the current batch.
    batch_bar: Option<ProgressBar>,
    /// Shown while the scheduler waits.
    sleep_bar: Option<ProgressBar>,
}

/// Interactive progress reporter using indicatif.
///
/// Shows one bar per batch that advances as repositories finish, and a
/// spinner while the scheduler sleeps. Per-repository problems are printed
/// above the bars.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: IngestProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            IngestProgress::RowsEnsured {
                year,
                month,
                created,
            } if created > 0 => {
                self.println(format!(
                    "{} {} new rows for {year}-{month:02}",
                    style("+").green(),
                    created
                ));
            }

            IngestProgress::BatchSelected { selected, .. } => {
                if let Some(bar) = state.sleep_bar.take() {
                    bar.finish_and_clear();
                }
                if selected > 0 {
                    let bar = self.multi.add(ProgressBar::new(selected as u64));
                    bar.set_style(Self::bar_style());
                    bar.set_prefix(format!("{:10}", "ingest"));
                    state.batch_bar = Some(bar);
                }
            }

            IngestProgress::ChunkStarted { index, size } => {
                if let Some(ref bar) = state.batch_bar {
                    bar.set_message(format!("chunk {} ({size} repos)", index + 1));
                }
            }

            IngestProgress::RepositoryUpdated { repository, .. } => {
                if let Some(ref bar) = state.batch_bar {
                    bar.set_message(repository);
                    bar.inc(1);
                }
            }

            IngestProgress::RepositoryUnavailable { repository, error } => {
                self.advance(&state, format!("{} {repository}: {error} (skipped)", style("-").yellow()));
            }

            IngestProgress::RepositoryFailed { repository, error } => {
                self.advance(&state, format!("{} {repository}: {error}", style("!").red()));
            }

            IngestProgress::RepositoryThrottled { repository, error } => {
                self.advance(&state, format!("{} {repository}: {error}", style("~").yellow()));
            }

            IngestProgress::QuotaExhausted { error, .. } => {
                if let Some(bar) = state.batch_bar.take() {
                    bar.abandon_with_message(format!("{}", style(error).yellow()));
                }
            }

            IngestProgress::BatchComplete { outcome } => {
                if let Some(bar) = state.batch_bar.take() {
                    bar.finish_with_message(format!(
                        "{} updated, {} completed, {} failed",
                        outcome.updated, outcome.completed, outcome.failed
                    ));
                }
            }

            IngestProgress::BatchFailed { error } => {
                if let Some(bar) = state.batch_bar.take() {
                    bar.abandon();
                }
                self.println(format!("{} batch failed: {error}", style("✗").red()));
            }

            IngestProgress::Sleeping { reason, until, .. } => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::spinner_style());
                bar.set_prefix(format!("{:10}", "sleep"));
                bar.set_message(format!(
                    "{reason} until {}",
                    until.format("%Y-%m-%d %H:%M:%S UTC")
                ));
                bar.enable_steady_tick(Duration::from_millis(100));
                state.sleep_bar = Some(bar);
            }

            _ => {}
        }
    }

    fn advance(&self, state: &ProgressState, line: String) {
        self.println(line);
        if let Some(ref bar) = state.batch_bar {
            bar.inc(1);
        }
    }

    fn println(&self, line: String) {
        if self.multi.println(&line).is_err() {
            eprintln!("{line}");
        }
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for bar in [state.batch_bar.take(), state.sleep_bar.take()]
            .into_iter()
            .flatten()
        {
            bar.finish_and_clear();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
