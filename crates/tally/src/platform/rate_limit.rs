use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// GitHub allows 5000 requests/hour per token; 10/sec leaves room for bursts
/// across a pool of tokens.
pub const GITHUB_DEFAULT_RPS: u32 = 10;

/// Proactive request pacing shared by every task that talks to the API.
///
/// This only smooths the request rate. Quota accounting stays with the
/// token pool.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Returns `None` for `0`, meaning pacing is disabled.
    pub fn new(requests_per_second: u32) -> Option<Self> {
        let rps = NonZeroU32::new(requests_per_second)?;
        Some(Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        })
    }

    /// Wait until another request may proceed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
