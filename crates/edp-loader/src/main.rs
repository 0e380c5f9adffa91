//! EDP Loader - Eviction filing ingestion tool

use anyhow::Result;
use clap::{Parser, Subcommand};
use edp_common::logging::{init_logging, LogConfig, LogLevel};
use edp_loader::config::LoaderConfig;
use edp_loader::loader::{Loader, PgStagingStore};
use edp_loader::run::run_load;
use edp_loader::storage::{config::StorageConfig, ObjectStore, Storage};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "edp-loader")]
#[command(author, version, about = "EDP eviction filing ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one load for a specific inbound object
    Load {
        /// Object key of the extract to load
        #[arg(short, long)]
        key: String,
    },

    /// Poll the inbound bucket and load each newly placed file
    Watch {
        /// Prefix to poll for new objects
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Seconds between polls
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("edp-loader".to_string())
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    let config = LoaderConfig::load()?;
    info!(
        env = %config.env,
        active_table = %config.active_table(),
        "loader configuration loaded"
    );

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    let storage = Storage::new(StorageConfig::from_env()?).await?;

    let loader = Loader::new(
        PgStagingStore::new(db),
        config.active_table(),
        config.staging_table(),
    );

    match cli.command {
        Command::Load { key } => {
            let report = run_load(&loader, &storage, &key).await?;
            info!(
                key = %report.key,
                rows = report.insert_stats.rows,
                skipped = report.parse_stats.skipped(),
                "done"
            );
        },
        Command::Watch { prefix, interval } => {
            info!(prefix = %prefix, interval, "watching inbound bucket");
            loop {
                let keys = storage.list_keys(&prefix).await?;
                for key in keys {
                    // Each file gets exactly one run; a failed run is
                    // terminal for that file (it has already been removed).
                    match run_load(&loader, &storage, &key).await {
                        Ok(report) => info!(
                            key = %report.key,
                            rows = report.insert_stats.rows,
                            "load complete"
                        ),
                        Err(e) => error!(key = %key, error = %e, "load failed"),
                    }
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        },
    }

    Ok(())
}
