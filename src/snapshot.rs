//! Snapshot materialization.
//!
//! Regenerates the static JSON artifacts the dashboard polls: totals.json,
//! daily.json (ascending date order, capped to a recent window), and
//! events.json (newest first, with display timestamps). Every artifact is
//! recomputed wholesale from current storage state and replaced as a unit.
//! The three publishes are independent: one failed write is logged and
//! reported without blocking the others.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::error;

use crate::config::Config;
use crate::models::EventView;
use crate::store::{self, EventFilter};

pub const TOTALS_FILE: &str = "totals.json";
pub const DAILY_FILE: &str = "daily.json";
pub const EVENTS_FILE: &str = "events.json";

/// Probe that the snapshot directory exists and accepts writes.
pub fn ensure_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".write-check");
    std::fs::write(&probe, b"")?;
    std::fs::remove_file(&probe)
}

pub async fn write_all(config: &Config, pool: &SqlitePool) -> Result<()> {
    let dir = &config.snapshots.dir;
    std::fs::create_dir_all(dir)?;

    let mut failed = 0u32;

    if let Err(err) = write_totals(pool, dir).await {
        error!("failed to publish {TOTALS_FILE}: {err:#}");
        failed += 1;
    }
    if let Err(err) = write_daily(pool, dir, config.ingest.daily_series_cap).await {
        error!("failed to publish {DAILY_FILE}: {err:#}");
        failed += 1;
    }
    if let Err(err) = write_events(pool, dir, config.ingest.max_recent_events).await {
        error!("failed to publish {EVENTS_FILE}: {err:#}");
        failed += 1;
    }

    if failed > 0 {
        anyhow::bail!("{failed} of 3 snapshot artifacts failed");
    }
    Ok(())
}

async fn write_totals(pool: &SqlitePool, dir: &Path) -> Result<()> {
    let totals = store::sum_totals(pool).await?;
    publish(dir, TOTALS_FILE, &serde_json::to_string_pretty(&totals)?)
}

async fn write_daily(pool: &SqlitePool, dir: &Path, cap: i64) -> Result<()> {
    let stats = store::scan_recent_daily_stats(pool, cap).await?;
    publish(dir, DAILY_FILE, &serde_json::to_string_pretty(&stats)?)
}

async fn write_events(pool: &SqlitePool, dir: &Path, limit: i64) -> Result<()> {
    let filter = EventFilter {
        limit,
        ..EventFilter::default()
    };
    let events = store::scan_events(pool, &filter).await?;
    let views: Vec<EventView> = events.into_iter().map(EventView::new).collect();
    publish(dir, EVENTS_FILE, &serde_json::to_string_pretty(&views)?)
}

fn publish(dir: &Path, name: &str, json: &str) -> Result<()> {
    std::fs::write(dir.join(name), json)?;
    Ok(())
}
