//! Retry helpers for transient upstream throttling.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

/// Initial delay before the first retry of a throttled request.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;
/// Upper bound on the delay between retries.
pub const MAX_BACKOFF_MS: u64 = 30_000;
/// Default number of retries for a secondary-rate-limited request.
pub const DEFAULT_THROTTLE_RETRIES: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: DEFAULT_THROTTLE_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn to_backoff(&self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Run `operation`, retrying with exponential backoff while `is_retryable`
/// accepts the error.
///
/// Each retry is logged at warn level with `context` so operators can see
/// secondary throttling as it happens. Once the retry budget is spent, the
/// last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    config: &RetryConfig,
    is_retryable: IsRetryable,
    context: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    IsRetryable: Fn(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.to_backoff())
        .notify(|err, dur| {
            tracing::warn!(
                context,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "upstream throttled request, backing off"
            );
        })
        .when(is_retryable)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();

        assert_eq!(config.min_delay, Duration::from_millis(INITIAL_BACKOFF_MS));
        assert_eq!(config.max_delay, Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(config.max_retries, DEFAULT_THROTTLE_RETRIES);
        assert!(config.with_jitter);
    }

    #[test]
    fn test_retry_config_builders() {
        let config = RetryConfig::new(Duration::from_secs(2), Duration::from_secs(30), 5)
            .with_max_retries(1)
            .with_jitter(false);

        assert_eq!(config.min_delay, Duration::from_secs(2));
        assert_eq!(config.max_retries, 1);
        assert!(!config.with_jitter);
    }

    #[derive(Debug, Clone)]
    struct TestError {
        message: &'static str,
        throttled: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_retries_throttled_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                let n = calls_capture.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError {
                        message: "throttled",
                        throttled: true,
                    })
                } else {
                    Ok(42u32)
                }
            }
        };

        let result = with_retry(
            operation,
            &RetryConfig::default(),
            |e: &TestError| e.throttled,
            "owner/repo",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError {
                    message: "throttled",
                    throttled: true,
                })
            }
        };

        let config = RetryConfig::default().with_max_retries(2);
        let err = with_retry(operation, &config, |e: &TestError| e.throttled, "ctx")
            .await
            .expect_err("expected error");

        assert_eq!(err.message, "throttled");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_retry_does_not_retry_other_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError {
                    message: "boom",
                    throttled: false,
                })
            }
        };

        let err = with_retry(
            operation,
            &RetryConfig::default(),
            |e: &TestError| e.throttled,
            "ctx",
        )
        .await
        .expect_err("expected error");

        assert_eq!(err.to_string(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
