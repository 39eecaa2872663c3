//! # Sortboard CLI
//!
//! The `sortboard` binary is the operational interface for the telemetry
//! service: database setup, batch ingestion, snapshot regeneration, CSV
//! export, and the dashboard HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! sortboard --config ./config/sortboard.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sortboard init` | Create the SQLite database and schema |
//! | `sortboard serve` | Start the dashboard HTTP server |
//! | `sortboard ingest <payload.json>` | Apply one batch payload from a file |
//! | `sortboard snapshot` | Regenerate the static JSON artifacts |
//! | `sortboard export` | Export daily statistics as CSV |
//! | `sortboard status` | Print a storage summary |

mod config;
mod db;
mod error;
mod export;
mod ingest;
mod migrate;
mod models;
mod query;
mod server;
mod snapshot;
mod status;
mod store;
mod validate;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Sortboard: telemetry ingest and dashboard backend for a waste-sorting
/// station.
#[derive(Parser)]
#[command(
    name = "sortboard",
    about = "Telemetry ingest and dashboard backend for a waste-sorting station",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sortboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and the sort_events / daily_stats tables.
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Start the dashboard HTTP server.
    Serve,

    /// Apply one batch payload (JSON file) to storage.
    ///
    /// The file must carry the same envelope the device POSTs to /ingest:
    /// api_key, timestamp, and optional events / stats arrays.
    Ingest {
        /// Path to the batch payload.
        payload: PathBuf,
    },

    /// Regenerate the static JSON snapshot artifacts from current storage.
    Snapshot,

    /// Export all daily statistics as CSV.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print a storage summary.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_logging(&cfg);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { payload } => {
            run_ingest_file(&cfg, &payload).await?;
        }
        Commands::Snapshot => {
            run_snapshot(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_ingest_file(cfg: &config::Config, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))?;
    let payload: serde_json::Value =
        serde_json::from_str(&raw).context("Payload is not valid JSON")?;

    let batch = validate::validate_batch(cfg, &payload)?;

    let pool = db::connect(cfg).await?;
    let summary = ingest::apply_batch(cfg, &pool, &batch).await?;
    pool.close().await;

    println!("ingest {}", path.display());
    println!("  events accepted: {}", summary.events_accepted);
    println!("  events skipped:  {}", summary.events_skipped);
    println!("  stats accepted:  {}", summary.stats_accepted);
    println!("  stats skipped:   {}", summary.stats_skipped);
    if summary.json_generated {
        println!("  snapshots: written");
        println!("ok");
    } else {
        println!("  snapshots: FAILED (data committed; see log)");
    }

    Ok(())
}

async fn run_snapshot(cfg: &config::Config) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::ensure_schema(&pool).await?;
    snapshot::write_all(cfg, &pool).await?;
    pool.close().await;

    println!("Snapshots written to {}", cfg.snapshots.dir.display());
    Ok(())
}

/// Operational log setup. Appends to the configured log file; when the sink
/// cannot be opened, falls back to stderr and keeps going. Logging must
/// never take the pipeline down.
fn init_logging(cfg: &config::Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_file = cfg.log.path.as_ref().and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    match log_file {
        Some(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
