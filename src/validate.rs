//! Batch envelope validation.
//!
//! Checks the whole-batch shape before anything touches storage: the shared
//! secret, the envelope timestamp, and that `events`/`stats` are arrays when
//! present. Individual record fields are deliberately not checked here:
//! the batch processor skips incomplete records one at a time, so a single
//! bad record cannot get the whole submission rejected.

use serde_json::Value;

use crate::config::Config;
use crate::error::IngestError;
use crate::models::Batch;

pub fn validate_batch(config: &Config, payload: &Value) -> Result<Batch, IngestError> {
    let api_key = payload.get("api_key").and_then(Value::as_str);
    if api_key != Some(config.ingest.api_key.as_str()) {
        return Err(IngestError::Unauthorized);
    }

    let timestamp = payload
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::MalformedRequest("Missing timestamp".to_string()))?
        .to_string();

    let events = collect_records(payload.get("events"))
        .ok_or_else(|| IngestError::MalformedRequest("Events must be an array".to_string()))?;
    let stats = collect_records(payload.get("stats"))
        .ok_or_else(|| IngestError::MalformedRequest("Stats must be an array".to_string()))?;

    Ok(Batch {
        timestamp,
        events,
        stats,
    })
}

// An absent (or null) field means an empty batch section, which is valid;
// any other non-array shape is a caller bug.
fn collect_records(field: Option<&Value>) -> Option<Vec<Value>> {
    match field {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(items)) => Some(items.clone()),
        Some(_) => None,
    }
}
