//! Core data model for waste-sorting telemetry.
//!
//! These types represent the records that flow through the ingest pipeline:
//! raw batch records as submitted by the sorting device, the rows stored in
//! SQLite, and the shapes served back to the dashboard.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single classification decision, keyed by a device-supplied id.
#[derive(Debug, Clone, Serialize)]
pub struct SortEvent {
    pub id: String,
    /// ISO-8601 text, sortable lexicographically.
    pub timestamp: String,
    pub item_type: String,
    pub confidence: f64,
    pub sort_destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One row of aggregate counts per calendar date (`YYYY-MM-DD`).
#[derive(Debug, Clone, Serialize)]
pub struct DailyStat {
    pub date: String,
    pub can_count: i64,
    pub recycling_count: i64,
    pub garbage_count: i64,
    pub total_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Column-wise sums across every daily row; also the totals.json artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total_cans: i64,
    pub total_recycling: i64,
    pub total_garbage: i64,
    pub grand_total: i64,
}

/// An event augmented with a display timestamp, as served to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: SortEvent,
    pub formatted_time: String,
}

impl EventView {
    pub fn new(event: SortEvent) -> Self {
        let formatted_time = format_event_time(&event.timestamp);
        Self {
            event,
            formatted_time,
        }
    }
}

/// Render a stored timestamp for display, e.g. "Jan 2, 2024, 3:04 PM".
///
/// Devices report ISO-8601 with or without an offset. A timestamp that
/// cannot be parsed is shown verbatim; display formatting must never fail a
/// snapshot or a query over one bad row.
pub fn format_event_time(raw: &str) -> String {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"));

    match parsed {
        Ok(dt) => dt.format("%b %-d, %Y, %-I:%M %p").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Raw event record as it appears in a batch payload.
///
/// Every field is optional here: the envelope validator only checks the
/// batch shape, and the batch processor decides per record whether enough
/// fields are present to store it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub item_type: Option<String>,
    pub confidence: Option<f64>,
    pub sort_destination: Option<String>,
    pub image_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: Option<Value>,
}

impl EventRecord {
    /// Promote to a storable event; `None` when any required field is absent.
    pub fn into_event(self) -> Option<SortEvent> {
        Some(SortEvent {
            id: self.id?,
            timestamp: self.timestamp?,
            item_type: self.item_type?,
            confidence: self.confidence?,
            sort_destination: self.sort_destination?,
            image_id: self.image_id,
            user_id: self.user_id,
            metadata: self.metadata,
        })
    }
}

/// Raw daily-statistics record as it appears in a batch payload.
///
/// A caller-supplied `total_count` is deliberately not modeled: the stored
/// total is always recomputed from the three counters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatRecord {
    pub date: Option<String>,
    pub can_count: Option<Value>,
    pub recycling_count: Option<Value>,
    pub garbage_count: Option<Value>,
    pub metadata: Option<Value>,
}

impl StatRecord {
    /// Promote to a storable row; `None` without a date. Counts are coerced
    /// to integers with absent values defaulting to 0.
    pub fn into_stat(self) -> Option<DailyStat> {
        let date = self.date?;
        let can_count = coerce_count(self.can_count.as_ref());
        let recycling_count = coerce_count(self.recycling_count.as_ref());
        let garbage_count = coerce_count(self.garbage_count.as_ref());

        Some(DailyStat {
            date,
            can_count,
            recycling_count,
            garbage_count,
            total_count: can_count + recycling_count + garbage_count,
            metadata: self.metadata,
        })
    }
}

// Devices have reported counts as numbers and as numeric strings; anything
// else counts as zero.
fn coerce_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// A validated ingest envelope. Records are still raw JSON at this point;
/// the batch processor decodes them one at a time.
#[derive(Debug, Clone)]
pub struct Batch {
    pub timestamp: String,
    pub events: Vec<Value>,
    pub stats: Vec<Value>,
}

/// Outcome of applying one batch to storage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub events_accepted: u64,
    pub events_skipped: u64,
    pub stats_accepted: u64,
    pub stats_skipped: u64,
    /// Whether the snapshot artifacts were regenerated after commit.
    pub json_generated: bool,
}
