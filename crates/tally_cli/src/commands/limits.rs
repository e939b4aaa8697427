use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::ValueEnum;

use tally::github::GitHubClient;
use tally::http::ReqwestTransport;
use tally::platform::{RateLimitInfo, TokenPool, short_error_message};

use crate::config::Config;

/// Output format for rate limit display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Query the GraphQL quota of every configured token.
pub(crate) async fn handle_limits(
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let tokens = Arc::new(TokenPool::new(&config.github.tokens, false));
    if tokens.is_empty() {
        return Err("No GitHub tokens configured. Set github.tokens or GITHUB_TOKENS.".into());
    }

    let transport = ReqwestTransport::with_timeout(config.request_timeout())?;
    let client = GitHubClient::new(Arc::new(transport), Arc::clone(&tokens), config.client_config());

    let hints = tokens.snapshot();
    let mut items = Vec::with_capacity(hints.len());
    for (credential, snapshot) in tokens.credentials().iter().zip(&hints) {
        let item = match client.rate_limit(credential).await {
            Ok(info) => RateLimitDisplay::from_info(&snapshot.hint, &info, Utc::now()),
            Err(e) => RateLimitDisplay::failed(&snapshot.hint, &short_error_message(&e)),
        };
        items.push(item);
    }

    RateLimitDisplay::print_many(items, output)
}

/// Rate limit information for display.
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct RateLimitDisplay {
    #[tabled(rename = "Token")]
    pub token: String,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Remaining")]
    pub remaining: String,
    #[tabled(rename = "Usage %")]
    pub usage_percent: String,
    #[tabled(rename = "Resets At")]
    pub reset_at: String,
    #[tabled(rename = "Resets In")]
    pub reset_in: String,
}

impl RateLimitDisplay {
    pub(crate) fn from_info(token: &str, info: &RateLimitInfo, now: DateTime<Utc>) -> Self {
        let usage_percent = if info.limit > 0 {
            (info.used as f64 / info.limit as f64) * 100.0
        } else {
            0.0
        };
        let reset_duration = info.reset_at.signed_duration_since(now);
        let reset_in = if reset_duration.num_seconds() > 0 {
            format_duration(reset_duration)
        } else {
            "now".to_string()
        };

        Self {
            token: token.to_string(),
            limit: info.limit.to_string(),
            used: info.used.to_string(),
            remaining: info.remaining.to_string(),
            usage_percent: format!("{:.1}%", usage_percent),
            reset_at: info.reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            reset_in,
        }
    }

    fn failed(token: &str, error: &str) -> Self {
        Self {
            token: token.to_string(),
            limit: "-".to_string(),
            used: "-".to_string(),
            remaining: "-".to_string(),
            usage_percent: "-".to_string(),
            reset_at: error.to_string(),
            reset_in: "-".to_string(),
        }
    }

    pub(crate) fn print_many(
        items: Vec<Self>,
        format: OutputFormat,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match format {
            OutputFormat::Table => {
                let mut table = tabled::Table::new(items);
                table.with(tabled::settings::Style::rounded());
                println!("{}", table);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&items)?);
            }
        }
        Ok(())
    }
}

/// Format a duration in a human-readable way.
pub(crate) fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}
