//! Live dashboard queries, read directly from storage.
//!
//! Unlike the snapshot artifacts, these run against current state on every
//! call. A concurrent ingest transaction is invisible until it commits.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::{DailyStat, EventView, Totals};
use crate::store::{self, EventFilter};

pub async fn totals(pool: &SqlitePool) -> Result<Totals> {
    Ok(store::sum_totals(pool).await?)
}

/// Statistics rows within the trailing `days` window, ascending by date.
/// A non-positive window means no cutoff.
pub async fn daily_stats(pool: &SqlitePool, days: i64) -> Result<Vec<DailyStat>> {
    let since = if days > 0 {
        let cutoff = chrono::Utc::now().date_naive() - chrono::Duration::days(days);
        Some(cutoff.format("%Y-%m-%d").to_string())
    } else {
        None
    };

    Ok(store::scan_daily_stats(pool, since.as_deref()).await?)
}

/// Recent events, newest first, with optional type and confidence filters.
pub async fn recent_events(
    pool: &SqlitePool,
    item_type: Option<String>,
    min_confidence: Option<f64>,
    limit: i64,
) -> Result<Vec<EventView>> {
    let filter = EventFilter {
        // The dashboard sends "all" when no type filter is selected.
        item_type: item_type.filter(|t| !t.is_empty() && t != "all"),
        min_confidence: min_confidence.filter(|c| *c > 0.0),
        limit,
    };

    let events = store::scan_events(pool, &filter).await?;
    Ok(events.into_iter().map(EventView::new).collect())
}
