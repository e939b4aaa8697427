//! Shared pool of API tokens with per-token quota tracking.
//!
//! Many fetch tasks draw credentials from one [`TokenPool`] at once. Quota
//! state only changes through [`TokenPool::report`], which callers feed from
//! the rate-limit headers of every response; the pool never decrements a
//! counter on its own.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Quota assumed for a token before the upstream has reported anything.
pub const INITIAL_QUOTA: i64 = 5000;

/// Returned by [`TokenPool::acquire`] when nothing can be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no API credential available")]
pub struct NoCredentialAvailable;

/// What a request should authenticate with.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Token(String),
    Anonymous,
}

impl Credential {
    /// The bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Credential::Token(t) => Some(t),
            Credential::Anonymous => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Token(t) => write!(f, "Token({})", redact(t)),
            Credential::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Keep the last four characters of tokens long enough to hide the rest.
fn redact(token: &str) -> String {
    if token.chars().count() <= 8 {
        return "****".to_string();
    }
    let tail = token
        .char_indices()
        .rev()
        .nth(3)
        .map_or(token, |(start, _)| &token[start..]);
    format!("****{tail}")
}

#[derive(Clone)]
struct TokenState {
    value: String,
    remaining: i64,
    reset_at: DateTime<Utc>,
}

impl TokenState {
    fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.remaining > 0 || now >= self.reset_at
    }
}

/// Point-in-time view of one token, safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub index: usize,
    pub hint: String,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub available: bool,
}

pub struct TokenPool {
    tokens: Mutex<Vec<TokenState>>,
    allow_anonymous: bool,
}

impl TokenPool {
    /// Build a pool from configured tokens.
    ///
    /// Blank entries and duplicates are dropped. An empty pool is valid; with
    /// `allow_anonymous` it hands out [`Credential::Anonymous`], otherwise every
    /// `acquire` fails.
    pub fn new<I, S>(tokens: I, allow_anonymous: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new_at(tokens, allow_anonymous, Utc::now())
    }

    pub fn new_at<I, S>(tokens: I, allow_anonymous: bool, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut states: Vec<TokenState> = Vec::new();
        for token in tokens {
            let value = token.as_ref().trim();
            if value.is_empty() || states.iter().any(|s| s.value == value) {
                continue;
            }
            states.push(TokenState {
                value: value.to_string(),
                remaining: INITIAL_QUOTA,
                reset_at: now,
            });
        }

        Self {
            tokens: Mutex::new(states),
            allow_anonymous,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TokenState>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn allows_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    pub fn acquire(&self) -> Result<Credential, NoCredentialAvailable> {
        self.acquire_at(Utc::now())
    }

    /// First token, in configuration order, that is available at `now`.
    pub fn acquire_at(&self, now: DateTime<Utc>) -> Result<Credential, NoCredentialAvailable> {
        let tokens = self.lock();
        if let Some(state) = tokens.iter().find(|s| s.is_available(now)) {
            return Ok(Credential::Token(state.value.clone()));
        }
        if self.allow_anonymous {
            Ok(Credential::Anonymous)
        } else {
            Err(NoCredentialAvailable)
        }
    }

    /// Record quota feedback for `token`. Unknown tokens are ignored.
    pub fn report(&self, token: &str, remaining: i64, reset_at: DateTime<Utc>) {
        let mut tokens = self.lock();
        if let Some(state) = tokens.iter_mut().find(|s| s.value == token) {
            state.remaining = remaining;
            state.reset_at = reset_at;
        }
    }

    /// Minimum reset time across all tokens, `None` for an empty pool.
    pub fn earliest_reset(&self) -> Option<DateTime<Utc>> {
        self.lock().iter().map(|s| s.reset_at).min()
    }

    /// Every configured token, in order.
    pub fn credentials(&self) -> Vec<Credential> {
        self.lock()
            .iter()
            .map(|s| Credential::Token(s.value.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> Vec<TokenSnapshot> {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Vec<TokenSnapshot> {
        self.lock()
            .iter()
            .enumerate()
            .map(|(index, s)| TokenSnapshot {
                index,
                hint: redact(&s.value),
                remaining: s.remaining,
                reset_at: s.reset_at,
                available: s.is_available(now),
            })
            .collect()
    }

    /// Emit one debug line per token.
    pub fn log_snapshot(&self) {
        for token in self.snapshot() {
            tracing::debug!(
                token = token.index,
                hint = %token.hint,
                remaining = token.remaining,
                reset_at = %token.reset_at,
                available = token.available,
                "token quota"
            );
        }
    }
}

impl fmt::Debug for TokenPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPool")
            .field("tokens", &self.snapshot())
            .field("allow_anonymous", &self.allow_anonymous)
            .finish()
    }
}
