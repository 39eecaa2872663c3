//! CSV export of the daily statistics table.
//!
//! Produces one row per stored date with the column names as the header.
//! Metadata that was rehydrated into structured JSON is serialized back to
//! text for its cell. Used by both `sortboard export` and the dashboard's
//! download endpoint.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::store;

pub const CSV_HEADER: &str = "date,can_count,recycling_count,garbage_count,total_count,metadata";

/// Render all statistics rows as CSV. Returns the document and the number
/// of data rows it contains.
pub async fn stats_csv(pool: &SqlitePool) -> Result<(String, usize)> {
    let stats = store::scan_daily_stats(pool, None).await?;

    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for stat in &stats {
        let metadata = stat
            .metadata
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_default();

        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_field(&stat.date),
            stat.can_count,
            stat.recycling_count,
            stat.garbage_count,
            stat.total_count,
            csv_field(&metadata),
        ));
    }

    Ok((out, stats.len()))
}

/// Write the CSV to `output`, or to stdout when no path is given.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    let (csv, rows) = stats_csv(&pool).await?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &csv)?;
            eprintln!("Exported {} statistics rows to {}", rows, path.display());
        }
        None => {
            print!("{csv}");
        }
    }

    pool.close().await;
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
