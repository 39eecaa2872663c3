//! Storage status overview.
//!
//! A quick summary of what has been ingested: event count, days of
//! statistics, and lifetime totals. Used by `sortboard status` to confirm
//! that device uploads are landing.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::store;

pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    let total_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sort_events")
        .fetch_one(&pool)
        .await?;
    let stat_days: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_stats")
        .fetch_one(&pool)
        .await?;
    let last_event: Option<String> = sqlx::query_scalar("SELECT MAX(timestamp) FROM sort_events")
        .fetch_one(&pool)
        .await?;
    let totals = store::sum_totals(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Sortboard — Storage Status");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Events:      {}", total_events);
    println!("  Last event:  {}", last_event.as_deref().unwrap_or("never"));
    println!("  Stat days:   {}", stat_days);
    println!();
    println!("  Cans:        {}", totals.total_cans);
    println!("  Recycling:   {}", totals.total_recycling);
    println!("  Garbage:     {}", totals.total_garbage);
    println!("  Grand total: {}", totals.grand_total);
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
