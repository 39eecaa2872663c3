//! Durable keyed storage for sort events and daily statistics.
//!
//! Upserts are idempotent by primary key and generic over the executor so
//! the batch processor can run them inside its transaction. Scans and
//! aggregates read from the pool directly.

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::models::{DailyStat, SortEvent, Totals};

/// Optional AND-combined filters for the recent-events scan.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub item_type: Option<String>,
    pub min_confidence: Option<f64>,
    pub limit: i64,
}

/// Insert or fully replace the event row keyed by `id`. Re-submitting an id
/// overwrites the prior record (last write wins).
pub async fn upsert_event<'e, E>(executor: E, event: &SortEvent) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sort_events (id, timestamp, item_type, confidence, sort_destination, image_id, user_id, metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            timestamp = excluded.timestamp,
            item_type = excluded.item_type,
            confidence = excluded.confidence,
            sort_destination = excluded.sort_destination,
            image_id = excluded.image_id,
            user_id = excluded.user_id,
            metadata = excluded.metadata
        "#,
    )
    .bind(&event.id)
    .bind(&event.timestamp)
    .bind(&event.item_type)
    .bind(event.confidence)
    .bind(&event.sort_destination)
    .bind(&event.image_id)
    .bind(&event.user_id)
    .bind(event.metadata.as_ref().map(|m| m.to_string()))
    .execute(executor)
    .await?;

    Ok(())
}

/// Insert or fully replace the statistics row keyed by `date` (overwrite,
/// not additive merge).
pub async fn upsert_daily_stat<'e, E>(executor: E, stat: &DailyStat) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO daily_stats (date, can_count, recycling_count, garbage_count, total_count, metadata)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(date) DO UPDATE SET
            can_count = excluded.can_count,
            recycling_count = excluded.recycling_count,
            garbage_count = excluded.garbage_count,
            total_count = excluded.total_count,
            metadata = excluded.metadata
        "#,
    )
    .bind(&stat.date)
    .bind(stat.can_count)
    .bind(stat.recycling_count)
    .bind(stat.garbage_count)
    .bind(stat.total_count)
    .bind(stat.metadata.as_ref().map(|m| m.to_string()))
    .execute(executor)
    .await?;

    Ok(())
}

/// Matching events, newest first.
pub async fn scan_events(
    pool: &SqlitePool,
    filter: &EventFilter,
) -> Result<Vec<SortEvent>, sqlx::Error> {
    let mut sql = String::from(
        "SELECT id, timestamp, item_type, confidence, sort_destination, image_id, user_id, metadata \
         FROM sort_events WHERE 1=1",
    );
    if filter.item_type.is_some() {
        sql.push_str(" AND item_type = ?");
    }
    if filter.min_confidence.is_some() {
        sql.push_str(" AND confidence >= ?");
    }
    sql.push_str(" ORDER BY timestamp DESC LIMIT ?");

    let mut query = sqlx::query(&sql);
    if let Some(ref item_type) = filter.item_type {
        query = query.bind(item_type);
    }
    if let Some(min_confidence) = filter.min_confidence {
        query = query.bind(min_confidence);
    }
    query = query.bind(filter.limit);

    let rows = query.fetch_all(pool).await?;
    Ok(rows.iter().map(event_from_row).collect())
}

/// All statistics rows in ascending date order, optionally bounded to dates
/// on or after `since`.
pub async fn scan_daily_stats(
    pool: &SqlitePool,
    since: Option<&str>,
) -> Result<Vec<DailyStat>, sqlx::Error> {
    let rows = match since {
        Some(cutoff) => {
            sqlx::query(
                "SELECT date, can_count, recycling_count, garbage_count, total_count, metadata \
                 FROM daily_stats WHERE date >= ? ORDER BY date ASC",
            )
            .bind(cutoff)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT date, can_count, recycling_count, garbage_count, total_count, metadata \
                 FROM daily_stats ORDER BY date ASC",
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.iter().map(stat_from_row).collect())
}

/// The most recent `limit` statistics rows, returned in ascending date order
/// for charting.
pub async fn scan_recent_daily_stats(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<DailyStat>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT date, can_count, recycling_count, garbage_count, total_count, metadata \
         FROM daily_stats ORDER BY date DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut stats: Vec<DailyStat> = rows.iter().map(stat_from_row).collect();
    stats.reverse();
    Ok(stats)
}

/// Column-wise sums across all statistics rows. An empty table yields
/// all-zero totals, never an error.
pub async fn sum_totals(pool: &SqlitePool) -> Result<Totals, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(can_count), 0) AS total_cans,
            COALESCE(SUM(recycling_count), 0) AS total_recycling,
            COALESCE(SUM(garbage_count), 0) AS total_garbage,
            COALESCE(SUM(total_count), 0) AS grand_total
        FROM daily_stats
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(Totals {
        total_cans: row.get("total_cans"),
        total_recycling: row.get("total_recycling"),
        total_garbage: row.get("total_garbage"),
        grand_total: row.get("grand_total"),
    })
}

fn event_from_row(row: &SqliteRow) -> SortEvent {
    SortEvent {
        id: row.get("id"),
        timestamp: row.get("timestamp"),
        item_type: row.get("item_type"),
        confidence: row.get("confidence"),
        sort_destination: row.get("sort_destination"),
        image_id: row.get("image_id"),
        user_id: row.get("user_id"),
        metadata: decode_metadata(row.get("metadata")),
    }
}

fn stat_from_row(row: &SqliteRow) -> DailyStat {
    DailyStat {
        date: row.get("date"),
        can_count: row.get("can_count"),
        recycling_count: row.get("recycling_count"),
        garbage_count: row.get("garbage_count"),
        total_count: row.get("total_count"),
        metadata: decode_metadata(row.get("metadata")),
    }
}

/// Metadata is stored as serialized JSON text. Text that no longer parses is
/// preserved as a plain string value rather than surfacing an error.
fn decode_metadata(raw: Option<String>) -> Option<serde_json::Value> {
    raw.map(|text| serde_json::from_str(&text).unwrap_or_else(|_| serde_json::Value::String(text)))
}
