//! Tally CLI - command-line runner for monthly GitHub engagement ingestion.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::commands::limits::OutputFormat;

#[derive(Parser)]
#[command(name = "tally")]
#[command(version)]
#[command(about = "Monthly engagement metrics for GitHub repositories")]
#[command(
    long_about = "Tally records, for every tracked GitHub repository, the stars, forks, merged \
pull requests, and opened/closed issues of each calendar month. Ingestion spreads \
requests over a pool of API tokens and sleeps when all of them are out of quota."
)]
#[command(after_long_help = r#"EXAMPLES
    Track some repositories:
        $ tally repo add rust-lang/rust tokio-rs/tokio

    Run ingestion until interrupted:
        $ tally ingest monthly

    Fill last month's rows once:
        $ tally ingest once --month 2 --year 2025

    Check token quotas:
        $ tally limits

CONFIGURATION
    Tally reads configuration from:
      1. ~/.config/tally/config.toml (or $XDG_CONFIG_HOME/tally/config.toml)
      2. ./tally.toml
      3. Environment variables (TALLY_ prefix, double underscore between keys)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    TALLY_DATABASE__URL       Database connection string (default: ~/.local/state/tally/tally.db)
    TALLY_GITHUB__TOKENS      Comma-separated GitHub tokens
    GITHUB_TOKENS             Same as above (legacy)
    DATABASE_DSN              Same as TALLY_DATABASE__URL (legacy)
    RUST_LOG                  Log filter (default: tally=info,tally_cli=info)
"#)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Manage tracked repositories
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
    /// Fetch engagement metrics
    Ingest {
        #[command(subcommand)]
        action: IngestAction,
    },
    /// Show GraphQL quota for each configured token
    Limits {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[derive(Subcommand)]
enum RepoAction {
    /// Start tracking one or more repositories
    Add {
        /// Repositories as owner/name
        #[arg(required = true)]
        repos: Vec<String>,
    },
    /// List tracked repositories
    List,
    /// Stop creating monthly rows for a repository
    Skip {
        /// Repository as owner/name
        repo: String,
    },
    /// Resume a skipped repository
    Unskip {
        /// Repository as owner/name
        repo: String,
    },
    /// Show a repository's monthly rows
    Show {
        /// Repository as owner/name
        repo: String,
    },
}

#[derive(Subcommand)]
enum IngestAction {
    /// Ingest continuously, sleeping when caught up or out of quota
    Monthly {
        /// Rows selected per batch (default from config or 1000)
        #[arg(short, long)]
        batch_size: Option<u64>,

        /// Repositories ingested concurrently (default from config or 10)
        #[arg(short, long)]
        chunk_size: Option<usize>,
    },
    /// Run a single batch and exit
    Once {
        /// Month to create rows for, 1-12 (default: current month)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Year to create rows for (default: current year)
        #[arg(short, long, requires = "month")]
        year: Option<i32>,

        /// Rows selected per batch (default from config or 1000)
        #[arg(short, long)]
        batch_size: Option<u64>,

        /// Repositories ingested concurrently (default from config or 10)
        #[arg(short, long)]
        chunk_size: Option<usize>,
    },
}

/// Human-readable logs on a terminal, JSON lines otherwise. On a terminal the
/// progress bars carry routine events, so only warnings are logged by default.
fn init_tracing(verbose: bool) {
    let is_tty = Term::stdout().is_term();
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("tally=debug,tally_cli=debug"),
        Err(_) if is_tty => EnvFilter::new("tally=warn,tally_cli=warn"),
        Err(_) => EnvFilter::new("tally=info,tally_cli=info"),
    };

    if is_tty {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't touch the database or the network
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    if let Commands::Limits { output } = &cli.command {
        return commands::limits::handle_limits(*output, &config).await;
    }

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set database.url")?;
    ensure_sqlite_dir(&database_url)?;

    match cli.command {
        Commands::Migrate { action } => {
            let db = tally::connect(&database_url).await?;
            commands::migrate::handle_migrate(action, &db).await?;
        }
        Commands::Repo { action } => {
            let db = tally::connect_and_migrate(&database_url).await?;
            commands::repo::handle_repo(action, &db).await?;
        }
        Commands::Ingest { action } => {
            let cancel = CancellationToken::new();
            shutdown::setup_shutdown_handler(cancel.clone());

            let db = tally::connect_and_migrate(&database_url).await?;
            commands::ingest::handle_ingest(action, &config, db, cancel).await?;
        }
        Commands::Limits { .. } | Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

/// Create the parent directory of an SQLite database file.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
