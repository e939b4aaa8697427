//! Tally - monthly engagement ingestion for GitHub repositories.
//!
//! For every tracked repository, tally keeps one row per calendar month
//! holding the stars, forks, merged pull requests, and opened/closed issues
//! recorded during that month. Rows are filled by a long-running scheduler
//! that spreads requests over a pool of API tokens and sleeps when every
//! token is out of quota.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to bring the schema up to date on connection.
//! - `sqlite`, `postgres` - Database drivers.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tally::github::{GitHubClient, GitHubClientConfig};
//! use tally::http::ReqwestTransport;
//! use tally::ingest::{IngestOptions, MonthlyIngestor, Scheduler, SchedulerOptions};
//! use tally::insight::SeaOrmInsightStore;
//! use tally::platform::TokenPool;
//!
//! let db = tally::connect_and_migrate("sqlite://tally.db?mode=rwc").await?;
//! let tokens = Arc::new(TokenPool::new(["ghp_a", "ghp_b"], false));
//! let client = GitHubClient::new(
//!     Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(30))?),
//!     Arc::clone(&tokens),
//!     GitHubClientConfig::default(),
//! );
//! let ingestor = MonthlyIngestor::new(
//!     Arc::new(SeaOrmInsightStore::new(db)),
//!     Arc::new(client),
//!     IngestOptions::default(),
//! );
//! Scheduler::new(ingestor, tokens, SchedulerOptions::default())
//!     .run(cancel)
//!     .await;
//! ```

pub mod calendar;
pub mod db;
pub mod entity;
pub mod github;
pub mod http;
pub mod ingest;
pub mod insight;
pub mod platform;
pub mod retry;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use ingest::{IngestError, MonthlyIngestor, Scheduler};
pub use insight::{InsightError, InsightStore, SeaOrmInsightStore};
pub use platform::{PlatformError, RepoName, TokenPool};
