//! The outer ingestion loop.
//!
//! Each iteration runs one batch, then [`decide`] turns the result into a
//! [`Decision`]: keep going, sleep until a point in time, or back off for a
//! fixed duration. `decide` is pure so the policy can be tested without
//! timers; [`Scheduler::run`] owns the clock and the sleeping.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tokio_util::sync::CancellationToken;

use crate::calendar::start_of_next_day;
use crate::insight::InsightStore;
use crate::platform::{RepositoryMetrics, TokenPool, short_error_message};

use super::engine::MonthlyIngestor;
use super::error::IngestError;
use super::progress::IngestProgress;
use super::types::BatchOutcome;

/// Pause after a batch fails for a reason other than quota.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepReason {
    /// Every pending row has been attempted today.
    CaughtUp,
    /// Waiting for the earliest credential reset.
    QuotaReset,
    /// Backing off after a failed batch.
    Error,
}

impl fmt::Display for SleepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SleepReason::CaughtUp => "caught up",
            SleepReason::QuotaReset => "quota reset",
            SleepReason::Error => "error backoff",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start the next batch immediately.
    Continue,
    SleepUntil {
        until: DateTime<Utc>,
        reason: SleepReason,
    },
    SleepFor {
        duration: Duration,
        reason: SleepReason,
    },
}

impl Decision {
    /// How long to sleep from `now`, or `None` to continue.
    pub fn sleep_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        match *self {
            Decision::Continue => None,
            Decision::SleepUntil { until, .. } => {
                Some((until - now).to_std().unwrap_or(Duration::ZERO))
            }
            Decision::SleepFor { duration, .. } => Some(duration),
        }
    }

    pub fn reason(&self) -> Option<SleepReason> {
        match *self {
            Decision::Continue => None,
            Decision::SleepUntil { reason, .. } | Decision::SleepFor { reason, .. } => {
                Some(reason)
            }
        }
    }
}

/// Map a batch result to what the loop does next.
pub fn decide(
    result: &Result<BatchOutcome, IngestError>,
    earliest_reset: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    error_backoff: Duration,
) -> Decision {
    let backoff = Decision::SleepFor {
        duration: error_backoff,
        reason: SleepReason::Error,
    };

    match result {
        Ok(outcome) if outcome.done => Decision::SleepUntil {
            until: start_of_next_day(now),
            reason: SleepReason::CaughtUp,
        },
        Ok(_) => Decision::Continue,
        Err(err) if err.is_exhaustion() => match earliest_reset {
            Some(reset) if reset > now => Decision::SleepUntil {
                until: reset,
                reason: SleepReason::QuotaReset,
            },
            Some(_) => Decision::Continue,
            None => backoff,
        },
        Err(_) => backoff,
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub error_backoff: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }
}

/// Runs [`MonthlyIngestor`] batches until cancelled.
pub struct Scheduler<S, M> {
    ingestor: MonthlyIngestor<S, M>,
    tokens: Arc<TokenPool>,
    options: SchedulerOptions,
}

impl<S, M> Scheduler<S, M>
where
    S: InsightStore + 'static,
    M: RepositoryMetrics + 'static,
{
    pub fn new(
        ingestor: MonthlyIngestor<S, M>,
        tokens: Arc<TokenPool>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            ingestor,
            tokens,
            options,
        }
    }

    /// Loop until `cancel` fires. An in-flight batch is dropped on
    /// cancellation; rows it already stored stay stored.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let now = Utc::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.ingestor.run_batch(now.month(), now.year()) => result,
            };

            match &result {
                Ok(outcome) => tracing::info!(
                    selected = outcome.selected,
                    updated = outcome.updated,
                    completed = outcome.completed,
                    failed = outcome.failed,
                    unavailable = outcome.unavailable,
                    throttled = outcome.throttled,
                    done = outcome.done,
                    "batch finished"
                ),
                Err(err) if err.is_exhaustion() => {
                    tracing::info!(error = %short_error_message(err), "batch stopped on quota")
                }
                Err(err) => {
                    tracing::error!(error = %err, "batch failed");
                    self.ingestor.emit(IngestProgress::BatchFailed {
                        error: short_error_message(err),
                    });
                }
            }
            self.tokens.log_snapshot();

            let now = Utc::now();
            let decision = decide(
                &result,
                self.tokens.earliest_reset(),
                now,
                self.options.error_backoff,
            );
            let (Some(duration), Some(reason)) = (decision.sleep_duration(now), decision.reason())
            else {
                continue;
            };

            let until = chrono::Duration::from_std(duration)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            tracing::info!(%reason, %until, secs = duration.as_secs(), "sleeping");
            self.ingestor.emit(IngestProgress::Sleeping {
                reason,
                duration,
                until,
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(duration) => {}
            }
        }
        tracing::info!("ingestion stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::TimeZone;

    use crate::ingest::progress::ProgressCallback;
    use crate::ingest::testing::{FakeMetrics, MemoryStore};
    use crate::ingest::types::IngestOptions;
    use crate::insight::InsightError;
    use crate::platform::PlatformError;

    const BACKOFF: Duration = Duration::from_secs(60);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap()
    }

    fn exhausted() -> Result<BatchOutcome, IngestError> {
        Err(IngestError::QuotaExhausted(PlatformError::NoCredentialAvailable))
    }

    #[test]
    fn done_sleeps_until_next_day() {
        let result = Ok(BatchOutcome {
            done: true,
            ..Default::default()
        });
        let decision = decide(&result, None, now(), BACKOFF);
        assert_eq!(
            decision,
            Decision::SleepUntil {
                until: Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap(),
                reason: SleepReason::CaughtUp,
            }
        );
        assert_eq!(decision.sleep_duration(now()), Some(Duration::from_secs(10 * 3600)));
    }

    #[test]
    fn not_done_continues() {
        let result = Ok(BatchOutcome {
            selected: 1000,
            ..Default::default()
        });
        let decision = decide(&result, None, now(), BACKOFF);
        assert_eq!(decision, Decision::Continue);
        assert_eq!(decision.sleep_duration(now()), None);
    }

    #[test]
    fn exhaustion_sleeps_until_earliest_reset() {
        let pool = TokenPool::new_at(["a", "b"], false, now());
        pool.report("a", 0, now() + chrono::Duration::seconds(30));
        pool.report("b", 0, now() + chrono::Duration::seconds(5));
        assert!(pool.acquire_at(now()).is_err());

        let decision = decide(&exhausted(), pool.earliest_reset(), now(), BACKOFF);
        assert_eq!(
            decision,
            Decision::SleepUntil {
                until: now() + chrono::Duration::seconds(5),
                reason: SleepReason::QuotaReset,
            }
        );
        assert_eq!(decision.sleep_duration(now()), Some(Duration::from_secs(5)));
    }

    #[test]
    fn exhaustion_with_passed_reset_continues() {
        let reset = now() - chrono::Duration::seconds(1);
        assert_eq!(decide(&exhausted(), Some(reset), now(), BACKOFF), Decision::Continue);
    }

    #[test]
    fn exhaustion_with_empty_pool_backs_off() {
        assert_eq!(
            decide(&exhausted(), None, now(), BACKOFF),
            Decision::SleepFor {
                duration: BACKOFF,
                reason: SleepReason::Error,
            }
        );
    }

    #[test]
    fn other_errors_back_off() {
        let result = Err(IngestError::Store(InsightError::InvalidInput {
            message: "month 13".into(),
        }));
        let decision = decide(&result, Some(now()), now(), BACKOFF);
        assert_eq!(decision.reason(), Some(SleepReason::Error));
        assert_eq!(decision.sleep_duration(now()), Some(BACKOFF));
    }

    #[test]
    fn sleep_until_the_past_is_zero() {
        let decision = Decision::SleepUntil {
            until: now() - chrono::Duration::seconds(10),
            reason: SleepReason::QuotaReset,
        };
        assert_eq!(decision.sleep_duration(now()), Some(Duration::ZERO));
    }

    fn scheduler(events: Arc<Mutex<Vec<IngestProgress>>>) -> Scheduler<MemoryStore, FakeMetrics> {
        scheduler_with(
            events,
            FakeMetrics::default(),
            Arc::new(TokenPool::new(["token"], false)),
        )
    }

    fn scheduler_with(
        events: Arc<Mutex<Vec<IngestProgress>>>,
        metrics: FakeMetrics,
        tokens: Arc<TokenPool>,
    ) -> Scheduler<MemoryStore, FakeMetrics> {
        let callback: ProgressCallback = Box::new(move |event| events.lock().unwrap().push(event));
        let ingestor = MonthlyIngestor::new(
            Arc::new(MemoryStore::with_repositories(2)),
            Arc::new(metrics),
            IngestOptions::default(),
        )
        .with_progress(callback);
        Scheduler::new(ingestor, tokens, SchedulerOptions::default())
    }

    fn cancel_after(delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
        cancel
    }

    fn count_batches(events: &[IngestProgress]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, IngestProgress::BatchComplete { .. }))
            .count()
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        scheduler(Arc::clone(&events)).run(cancel).await;
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let cancel = cancel_after(Duration::from_millis(10));

        scheduler(Arc::clone(&events)).run(cancel).await;

        let events = events.lock().unwrap();
        assert_eq!(count_batches(&events), 1);
        assert!(events.iter().any(|e| matches!(
            e,
            IngestProgress::Sleeping {
                reason: SleepReason::CaughtUp,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn persistently_throttled_repository_does_not_spin() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let metrics = FakeMetrics::default().failing("owner/repo-0", || PlatformError::Throttled {
            message: "secondary rate limit".into(),
        });
        let scheduler = scheduler_with(
            Arc::clone(&events),
            metrics,
            Arc::new(TokenPool::new(["token"], false)),
        );

        scheduler.run(cancel_after(Duration::from_millis(10))).await;

        let events = events.lock().unwrap();
        assert_eq!(count_batches(&events), 1);
        assert!(events.iter().any(|e| matches!(
            e,
            IngestProgress::BatchComplete { outcome } if outcome.throttled == 1 && outcome.done
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            IngestProgress::Sleeping {
                reason: SleepReason::CaughtUp,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_sleeps_until_the_pool_resets() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let reset = Utc::now() + chrono::Duration::hours(1);
        let tokens = Arc::new(TokenPool::new(["token"], false));
        tokens.report("token", 0, reset);
        let metrics =
            FakeMetrics::default().failing("owner/repo-0", || PlatformError::NoCredentialAvailable);

        scheduler_with(Arc::clone(&events), metrics, tokens)
            .run(cancel_after(Duration::from_millis(10)))
            .await;

        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, IngestProgress::QuotaExhausted { .. })));
        assert_eq!(count_batches(&events), 0);
        let sleeps: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                IngestProgress::Sleeping { reason, until, .. } => Some((*reason, *until)),
                _ => None,
            })
            .collect();
        assert_eq!(sleeps, vec![(SleepReason::QuotaReset, reset)]);
    }
}
