//! Batch ingest pipeline.
//!
//! Applies a validated batch to storage inside a single transaction, then
//! regenerates the snapshot artifacts. Records with missing fields are
//! counted and skipped without aborting the batch; any storage-level error
//! rolls the whole batch back. The committed write and the snapshot refresh
//! are separate failure domains: a failed refresh is reported in the
//! summary, never by un-committing data.

use serde_json::Value;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::IngestError;
use crate::migrate;
use crate::models::{Batch, DailyStat, EventRecord, IngestSummary, SortEvent, StatRecord};
use crate::snapshot;
use crate::store;

pub async fn apply_batch(
    config: &Config,
    pool: &SqlitePool,
    batch: &Batch,
) -> Result<IngestSummary, IngestError> {
    // Surface an unusable snapshot directory before any work happens.
    snapshot::ensure_writable(&config.snapshots.dir)?;
    migrate::ensure_schema(pool).await?;

    let mut summary = IngestSummary::default();
    let mut tx = pool.begin().await?;

    match apply_records(&mut tx, batch, &mut summary).await {
        Ok(()) => {
            tx.commit().await?;
        }
        Err(err) => {
            // The rollback outcome is secondary; the storage error is what
            // the caller needs to see.
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback after failed batch also failed: {rollback_err}");
            }
            error!("batch rejected, rolled back: {err}");
            return Err(err.into());
        }
    }

    info!(
        batch_timestamp = %batch.timestamp,
        events_accepted = summary.events_accepted,
        events_skipped = summary.events_skipped,
        stats_accepted = summary.stats_accepted,
        stats_skipped = summary.stats_skipped,
        "batch committed"
    );

    summary.json_generated = match snapshot::write_all(config, pool).await {
        Ok(()) => true,
        Err(err) => {
            error!("snapshot refresh failed: {err:#}");
            false
        }
    };

    Ok(summary)
}

async fn apply_records(
    tx: &mut Transaction<'_, Sqlite>,
    batch: &Batch,
    summary: &mut IngestSummary,
) -> Result<(), sqlx::Error> {
    for value in &batch.events {
        match decode_event(value) {
            Some(event) => {
                store::upsert_event(&mut **tx, &event).await?;
                summary.events_accepted += 1;
            }
            None => summary.events_skipped += 1,
        }
    }

    for value in &batch.stats {
        match decode_stat(value) {
            Some(stat) => {
                store::upsert_daily_stat(&mut **tx, &stat).await?;
                summary.stats_accepted += 1;
            }
            None => summary.stats_skipped += 1,
        }
    }

    Ok(())
}

fn decode_event(value: &Value) -> Option<SortEvent> {
    let record: EventRecord = serde_json::from_value(value.clone()).ok()?;
    record.into_event()
}

fn decode_stat(value: &Value) -> Option<DailyStat> {
    let record: StatRecord = serde_json::from_value(value.clone()).ok()?;
    record.into_stat()
}
