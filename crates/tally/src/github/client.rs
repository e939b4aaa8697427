//! GraphQL client that draws credentials from a shared [`TokenPool`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, header_get};
use crate::platform::{ApiRateLimiter, Credential, GITHUB_DEFAULT_RPS, RateLimitInfo, TokenPool};
use crate::retry::{RetryConfig, with_retry};

use super::error::{GitHubError, is_secondary_rate_limit};
use super::types::{GitHubRateLimitResponse, GraphQlResponse};

pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// How long a spent token is parked when GitHub sent no usable reset time.
const UNKNOWN_RESET_SECS: i64 = 60;

/// Endpoint and pacing settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub graphql_url: String,
    pub api_url: String,
    /// Proactive pacing across all tasks; `0` disables it.
    pub requests_per_second: u32,
    /// Backoff for secondary rate limits (HTTP 429).
    pub retry: RetryConfig,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            requests_per_second: GITHUB_DEFAULT_RPS,
            retry: RetryConfig::default(),
        }
    }
}

/// GitHub API client.
///
/// Cloning is cheap and clones share the transport, token pool, and limiter.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenPool>,
    rate_limiter: Option<ApiRateLimiter>,
    retry: RetryConfig,
    graphql_url: String,
    api_url: String,
}

impl GitHubClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenPool>,
        config: GitHubClientConfig,
    ) -> Self {
        Self {
            transport,
            tokens,
            rate_limiter: ApiRateLimiter::new(config.requests_per_second),
            retry: config.retry,
            graphql_url: config.graphql_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenPool> {
        &self.tokens
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    /// Feed quota headers back to the pool for the token that was used.
    fn record_quota(&self, credential: &Credential, headers: &HttpHeaders) {
        if let Some(token) = credential.token()
            && let Some((remaining, reset_at)) = quota_feedback(headers, Utc::now())
        {
            self.tokens.report(token, remaining, reset_at);
        }
    }

    /// Run a GraphQL query, retrying secondary rate limits with backoff.
    ///
    /// `resource` names what is being fetched and appears in not-found and
    /// access errors.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &serde_json::Value,
        resource: &str,
    ) -> Result<T, GitHubError> {
        with_retry(
            || self.graphql_once(query, variables, resource),
            &self.retry,
            is_secondary_rate_limit,
            resource,
        )
        .await
    }

    async fn graphql_once<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &serde_json::Value,
        resource: &str,
    ) -> Result<T, GitHubError> {
        self.wait_for_rate_limit().await;
        let credential = self.tokens.acquire()?;

        let body = serde_json::to_vec(&json!({ "query": query, "variables": variables }))
            .map_err(|e| GitHubError::Decode(e.to_string()))?;
        let request = authorize(
            HttpRequest::new(HttpMethod::Post, &self.graphql_url)
                .header("Content-Type", "application/json")
                .body(body),
            &credential,
        );

        let response = self.transport.send(request).await?;
        self.record_quota(&credential, &response.headers);
        check_status(&response, resource)?;
        decode_graphql(&response.body, resource)
    }

    /// Query `GET /rate_limit` for one credential.
    ///
    /// The GraphQL bucket from the response is fed back into the pool, so
    /// this doubles as a quota refresh.
    pub async fn rate_limit(&self, credential: &Credential) -> Result<RateLimitInfo, GitHubError> {
        self.wait_for_rate_limit().await;

        let url = format!("{}/rate_limit", self.api_url);
        let request = authorize(
            HttpRequest::new(HttpMethod::Get, url).header("Accept", "application/vnd.github+json"),
            credential,
        );
        let response = self.transport.send(request).await?;
        check_status(&response, "rate_limit")?;

        let parsed: GitHubRateLimitResponse = serde_json::from_slice(&response.body)
            .map_err(|e| GitHubError::Decode(e.to_string()))?;
        let bucket = parsed
            .resources
            .graphql
            .unwrap_or(parsed.resources.core);

        let info = RateLimitInfo {
            limit: bucket.limit,
            remaining: bucket.remaining,
            used: bucket.used,
            reset_at: bucket.reset_at(),
        };
        if let Some(token) = credential.token() {
            self.tokens
                .report(token, info.remaining as i64, info.reset_at);
        }
        Ok(info)
    }
}

fn authorize(request: HttpRequest, credential: &Credential) -> HttpRequest {
    match credential.token() {
        Some(token) => request.header("Authorization", format!("Bearer {token}")),
        None => request,
    }
}

/// Extract `(remaining, reset_at)` from GitHub rate limit headers.
///
/// The reset header is epoch seconds. Returns `None` if either header is
/// missing or malformed.
pub fn parse_quota_headers(headers: &HttpHeaders) -> Option<(i64, DateTime<Utc>)> {
    let remaining = header_get(headers, "x-ratelimit-remaining")?
        .trim()
        .parse::<i64>()
        .ok()?;
    let reset_epoch = header_get(headers, "x-ratelimit-reset")?
        .trim()
        .parse::<i64>()
        .ok()?;
    let reset_at = DateTime::from_timestamp(reset_epoch, 0)?;
    Some((remaining, reset_at))
}

/// Quota to report for a response. A spent token with no parseable reset is
/// still parked, for [`UNKNOWN_RESET_SECS`].
fn quota_feedback(headers: &HttpHeaders, now: DateTime<Utc>) -> Option<(i64, DateTime<Utc>)> {
    parse_quota_headers(headers).or_else(|| {
        let remaining = header_get(headers, "x-ratelimit-remaining")?
            .trim()
            .parse::<i64>()
            .ok()?;
        (remaining <= 0).then(|| (0, now + chrono::Duration::seconds(UNKNOWN_RESET_SECS)))
    })
}

fn check_status(response: &HttpResponse, resource: &str) -> Result<(), GitHubError> {
    match response.status {
        200..=299 => Ok(()),
        404 => Err(GitHubError::NotFound(resource.to_string())),
        403 if quota_spent(response) => Err(GitHubError::QuotaExhausted {
            reset_at: parse_quota_headers(&response.headers).map(|(_, reset)| reset),
        }),
        403 if secondary_limited(response) => {
            Err(GitHubError::TooManyRequests(resource.to_string()))
        }
        403 | 451 => Err(GitHubError::AccessBlocked(resource.to_string())),
        429 => Err(GitHubError::TooManyRequests(resource.to_string())),
        status => Err(GitHubError::Status {
            status,
            body: response.body_text(),
        }),
    }
}

fn quota_spent(response: &HttpResponse) -> bool {
    response
        .header("x-ratelimit-remaining")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .is_some_and(|remaining| remaining <= 0)
}

/// GitHub answers secondary limits with 403 too, flagged by `Retry-After`
/// or the message text.
fn secondary_limited(response: &HttpResponse) -> bool {
    response.header("retry-after").is_some()
        || response
            .body_text()
            .to_ascii_lowercase()
            .contains("secondary rate limit")
}

fn decode_graphql<T: DeserializeOwned>(body: &[u8], resource: &str) -> Result<T, GitHubError> {
    let envelope: GraphQlResponse<T> =
        serde_json::from_slice(body).map_err(|e| GitHubError::Decode(e.to_string()))?;

    if let Some(err) = envelope.errors.first() {
        if envelope.errors.iter().any(|e| e.is_not_found()) {
            return Err(GitHubError::NotFound(resource.to_string()));
        }
        return Err(GitHubError::GraphQl(err.message.clone()));
    }

    envelope
        .data
        .ok_or_else(|| GitHubError::Decode("response has neither data nor errors".to_string()))
}
