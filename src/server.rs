//! Dashboard HTTP API.
//!
//! Thin shell over the ingest pipeline and the query service. The sorting
//! device POSTs batches to `/ingest`; the live dashboard reads the query
//! endpoints; the static dashboard reads the snapshot artifacts from disk
//! and never touches this server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Apply one telemetry batch |
//! | `GET`  | `/api/stats/totals` | Lifetime totals |
//! | `GET`  | `/api/stats/daily?days=30` | Daily series in the trailing window |
//! | `GET`  | `/api/events?item_type=&confidence=&limit=` | Recent events, filtered |
//! | `GET`  | `/api/export/csv` | All daily statistics as CSV |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Ingest responses always carry the `{success, message?, error?,
//! json_generated?}` envelope the device-side uploader checks. Query
//! failures use `{ "error": "..." }` with a generic message; the cause goes
//! to the operational log.
//!
//! Ingest calls are serialized through an in-process lock so at most one
//! batch transaction is in flight at a time. Reads are not serialized: WAL
//! isolation guarantees they see pre- or post-transaction state, never an
//! intermediate one.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::export;
use crate::ingest;
use crate::migrate;
use crate::models::{DailyStat, EventView, IngestSummary, Totals};
use crate::query;
use crate::snapshot;
use crate::validate;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    /// Single-writer discipline: one batch transaction in flight at a time.
    ingest_lock: Arc<Mutex<()>>,
}

/// Starts the dashboard HTTP server. Binds to `[server].bind` and runs
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;
    snapshot::ensure_writable(&config.snapshots.dir)?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        ingest_lock: Arc::new(Mutex::new(())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingest", post(handle_ingest).fallback(handle_ingest_method))
        .route("/api/stats/totals", get(handle_totals))
        .route("/api/stats/daily", get(handle_daily))
        .route("/api/events", get(handle_events))
        .route("/api/export/csv", get(handle_export_csv))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ POST /ingest ============

/// Response envelope for the ingest endpoint, matching what the device-side
/// uploader expects.
#[derive(Serialize)]
struct IngestResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_generated: Option<bool>,
}

impl IngestResponse {
    fn ok(summary: &IngestSummary) -> Self {
        Self {
            success: true,
            message: Some(format!(
                "Processed {} events and {} statistics records",
                summary.events_accepted, summary.stats_accepted
            )),
            error: None,
            json_generated: Some(summary.json_generated),
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            json_generated: None,
        }
    }
}

async fn handle_ingest(
    State(state): State<AppState>,
    body: String,
) -> (StatusCode, Json<IngestResponse>) {
    let payload: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(IngestResponse::failure("Invalid JSON data")),
            );
        }
    };

    let batch = match validate::validate_batch(&state.config, &payload) {
        Ok(batch) => batch,
        Err(err) => {
            warn!("batch rejected before processing: {err}");
            let status = match err {
                IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_REQUEST,
            };
            return (status, Json(IngestResponse::failure(err.to_string())));
        }
    };

    let _writer = state.ingest_lock.lock().await;
    match ingest::apply_batch(&state.config, &state.pool, &batch).await {
        Ok(summary) => (StatusCode::OK, Json(IngestResponse::ok(&summary))),
        Err(err) => {
            // Generic message to the caller; the cause is already logged.
            error!("ingest failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(IngestResponse::failure("Database error")),
            )
        }
    }
}

async fn handle_ingest_method() -> (StatusCode, Json<IngestResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(IngestResponse::failure("Invalid request method. Use POST.")),
    )
}

// ============ Query endpoints ============

/// Internal error type that converts into a JSON error response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!("query failed: {err:#}");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Internal server error".to_string(),
    }
}

async fn handle_totals(State(state): State<AppState>) -> Result<Json<Totals>, AppError> {
    let totals = query::totals(&state.pool).await.map_err(internal)?;
    Ok(Json(totals))
}

#[derive(Deserialize)]
struct DailyParams {
    days: Option<i64>,
}

async fn handle_daily(
    State(state): State<AppState>,
    Query(params): Query<DailyParams>,
) -> Result<Json<Vec<DailyStat>>, AppError> {
    let days = params.days.unwrap_or(30);
    let stats = query::daily_stats(&state.pool, days)
        .await
        .map_err(internal)?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
struct EventsParams {
    item_type: Option<String>,
    confidence: Option<f64>,
    limit: Option<i64>,
}

async fn handle_events(
    State(state): State<AppState>,
    Query(params): Query<EventsParams>,
) -> Result<Json<Vec<EventView>>, AppError> {
    let limit = params.limit.unwrap_or(50);
    let events = query::recent_events(&state.pool, params.item_type, params.confidence, limit)
        .await
        .map_err(internal)?;
    Ok(Json(events))
}

async fn handle_export_csv(State(state): State<AppState>) -> Result<Response, AppError> {
    let (csv, rows) = export::stats_csv(&state.pool).await.map_err(internal)?;

    if rows == 0 {
        return Err(AppError {
            status: StatusCode::NOT_FOUND,
            message: "No data to export".to_string(),
        });
    }

    let headers = [
        (header::CONTENT_TYPE, "text/csv"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"waste_sorting_stats.csv\"",
        ),
    ];
    Ok((headers, csv).into_response())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// Whether the storage file exists yet.
    database: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: state.config.db.path.exists(),
    })
}
