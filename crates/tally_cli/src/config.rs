//! Configuration file support for tally.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Legacy environment variables (`GITHUB_TOKENS`, `DATABASE_DSN`)
//! 3. Environment variables prefixed with `TALLY_`, nested keys joined by a
//!    double underscore (e.g. `TALLY_DATABASE__URL`, `TALLY_GITHUB__TOKENS`)
//! 4. Config file (./tally.toml, then ~/.config/tally/config.toml)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "postgres://tally@localhost/tally"  # default: SQLite in the XDG state dir
//!
//! [github]
//! tokens = ["ghp_...", "ghp_..."]
//! allow_anonymous = false
//! requests_per_second = 10
//! timeout_secs = 30
//!
//! [ingest]
//! batch_size = 1000
//! chunk_size = 10
//! error_backoff_secs = 60
//! throttle_retries = 3
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer};

use tally::github::{DEFAULT_API_URL, DEFAULT_GRAPHQL_URL, GitHubClientConfig};
use tally::ingest::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_ERROR_BACKOFF, IngestOptions,
    SchedulerOptions,
};
use tally::platform::GITHUB_DEFAULT_RPS;
use tally::retry::{DEFAULT_THROTTLE_RETRIES, RetryConfig};

const LEGACY_TOKENS_VAR: &str = "GITHUB_TOKENS";
const LEGACY_DATABASE_VAR: &str = "DATABASE_DSN";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Accepts a list or a comma-separated string.
    #[serde(deserialize_with = "deserialize_tokens")]
    pub tokens: Vec<String>,
    /// Fall back to unauthenticated requests when every token is exhausted.
    pub allow_anonymous: bool,
    pub graphql_url: String,
    pub api_url: String,
    /// `0` disables proactive pacing.
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            allow_anonymous: false,
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            requests_per_second: GITHUB_DEFAULT_RPS,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: u64,
    pub chunk_size: usize,
    pub error_backoff_secs: u64,
    pub throttle_retries: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            error_backoff_secs: DEFAULT_ERROR_BACKOFF.as_secs(),
            throttle_retries: DEFAULT_THROTTLE_RETRIES,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenList {
    List(Vec<String>),
    Joined(String),
}

fn split_tokens(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_tokens<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match TokenList::deserialize(deserializer)? {
        TokenList::List(tokens) => tokens,
        TokenList::Joined(joined) => split_tokens(&joined),
    })
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Failures are logged and fall back to defaults.
    pub fn load() -> Self {
        match Self::builder().and_then(|b| b.build()?.try_deserialize::<Config>()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "tally") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("tally.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./tally.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("TALLY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Ok(tokens) = std::env::var(LEGACY_TOKENS_VAR) {
            builder = builder.set_override("github.tokens", split_tokens(&tokens))?;
        }
        if let Ok(dsn) = std::env::var(LEGACY_DATABASE_VAR) {
            builder = builder.set_override("database.url", dsn)?;
        }

        Ok(builder)
    }

    /// The configured database URL, or an SQLite file in the state directory.
    ///
    /// The `mode=rwc` parameter creates the file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("tally.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn client_config(&self) -> GitHubClientConfig {
        GitHubClientConfig {
            graphql_url: self.github.graphql_url.clone(),
            api_url: self.github.api_url.clone(),
            requests_per_second: self.github.requests_per_second,
            retry: RetryConfig::default().with_max_retries(self.ingest.throttle_retries),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.github.timeout_secs.max(1))
    }

    /// Ingest options with CLI overrides applied.
    pub fn ingest_options(&self, batch_size: Option<u64>, chunk_size: Option<usize>) -> IngestOptions {
        IngestOptions::default()
            .with_batch_size(batch_size.unwrap_or(self.ingest.batch_size))
            .with_chunk_size(chunk_size.unwrap_or(self.ingest.chunk_size))
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            error_backoff: Duration::from_secs(self.ingest.error_backoff_secs),
        }
    }

    /// On Linux, this is `$XDG_STATE_HOME/tally` or `~/.local/state/tally`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tally").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert!(config.github.tokens.is_empty());
        assert!(!config.github.allow_anonymous);
        assert_eq!(config.github.graphql_url, "https://api.github.com/graphql");
        assert_eq!(config.github.requests_per_second, 10);
        assert_eq!(config.ingest.batch_size, 1000);
        assert_eq!(config.ingest.chunk_size, 10);
        assert_eq!(config.ingest.error_backoff_secs, 60);
    }

    #[test]
    fn test_full_config_parsing() {
        let config = parse(
            r#"
            [database]
            url = "sqlite:///tmp/test.db"

            [github]
            tokens = ["ghp_one", "ghp_two"]
            allow_anonymous = true
            requests_per_second = 0
            timeout_secs = 5

            [ingest]
            batch_size = 50
            chunk_size = 4
            error_backoff_secs = 15
            throttle_retries = 1
        "#,
        );

        assert_eq!(config.database.url.as_deref(), Some("sqlite:///tmp/test.db"));
        assert_eq!(config.github.tokens, vec!["ghp_one", "ghp_two"]);
        assert!(config.github.allow_anonymous);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.client_config().requests_per_second, 0);
        assert_eq!(config.client_config().retry.max_retries, 1);

        let options = config.ingest_options(None, None);
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.chunk_size, 4);
        assert_eq!(
            config.scheduler_options().error_backoff,
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_tokens_from_comma_separated_string() {
        let config = parse(
            r#"
            [github]
            tokens = "ghp_one, ghp_two,,"
        "#,
        );
        assert_eq!(config.github.tokens, vec!["ghp_one", "ghp_two"]);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse(
            r#"
            [ingest]
            chunk_size = 3
        "#,
        );
        assert_eq!(config.ingest.chunk_size, 3);
        assert_eq!(config.ingest.batch_size, 1000);
        assert_eq!(config.github.api_url, "https://api.github.com");
    }

    #[test]
    fn test_cli_flags_override_config() {
        let config = Config::default();
        let options = config.ingest_options(Some(7), Some(0));
        assert_eq!(options.batch_size, 7);
        assert_eq!(options.chunk_size, 1);
    }

    #[test]
    fn test_database_url_defaults_to_state_dir() {
        let config = Config::default();
        if let Some(url) = config.database_url() {
            assert!(url.starts_with("sqlite://"));
            assert!(url.ends_with("tally.db?mode=rwc"));
        }
    }

    #[test]
    fn test_database_url_respects_configured_value() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/tally"
        "#,
        );
        assert_eq!(
            config.database_url().as_deref(),
            Some("postgres://localhost/tally")
        );
    }

    #[test]
    fn test_split_tokens() {
        assert_eq!(split_tokens(" a ,b, ,c"), vec!["a", "b", "c"]);
        assert!(split_tokens("").is_empty());
    }
}
