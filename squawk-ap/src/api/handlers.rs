//! HTTP request handlers

use crate::api::server::AppContext;
use crate::playback::PlaybackStatus;
use crate::track::{TrackId, TrackRequest, TrackSummary};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Ledger entries returned by `/log` when no limit is given
const DEFAULT_LOG_LIMIT: usize = 5;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

/// `{"status": "<reason phrase>", "msg": "..."}`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
    msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<Uuid>,
}

type Reply = (StatusCode, Json<StatusResponse>);

fn reply(code: StatusCode, msg: impl Into<String>) -> Reply {
    (
        code,
        Json(StatusResponse {
            status: code.canonical_reason().unwrap_or("Unknown").to_string(),
            msg: msg.into(),
            request_id: None,
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct AddParams {
    video: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    entries: Vec<TrackSummary>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    evicted: usize,
    failed: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "squawk-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET|POST /add?video=<id> - Fetch a track and queue it
///
/// Answers 202 once the id is validated; the fetch runs in the background.
pub async fn add(State(ctx): State<AppContext>, Query(params): Query<AddParams>) -> Reply {
    let Some(raw) = params.video.filter(|v| !v.is_empty()) else {
        warn!("Add request without video id");
        return reply(StatusCode::BAD_REQUEST, "Missing 'video' parameter");
    };

    let id = match TrackId::parse(&raw) {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejected add request: {}", e);
            return reply(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let request = TrackRequest::new(id.clone());
    let request_id = request.request_id;
    info!("Add request: {}", id);

    let fetch = ctx.fetch.clone();
    tokio::spawn(async move {
        if let Err(e) = fetch.submit(request).await {
            debug!("Request {} dropped: {}", request_id, e);
        }
    });

    let (code, Json(mut body)) = reply(
        StatusCode::ACCEPTED,
        format!("Added {} to the download queue", id),
    );
    body.request_id = Some(request_id);
    (code, Json(body))
}

/// GET|POST /next - Skip to the next queued track
pub async fn next(State(ctx): State<AppContext>) -> Reply {
    info!("Skip request");
    let controller = ctx.controller.clone();
    tokio::spawn(async move {
        let outcome = controller.skip().await;
        debug!("Skip finished: {:?}", outcome);
    });
    reply(StatusCode::OK, "Attempting to play next audio file")
}

/// GET|POST /toggle - Pause or resume playback
pub async fn toggle(State(ctx): State<AppContext>) -> Reply {
    match ctx.controller.toggle_pause().await {
        Ok(true) => reply(StatusCode::OK, "Playback resumed"),
        Ok(false) => reply(StatusCode::OK, "Playback paused"),
        Err(e) => {
            error!("Toggle failed: {}", e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /status - Now playing, queue, and recent history
pub async fn status(State(ctx): State<AppContext>) -> Json<PlaybackStatus> {
    Json(ctx.controller.status().await)
}

/// GET /log?limit=N - Most recently played tracks, newest first
pub async fn log(
    State(ctx): State<AppContext>,
    Query(params): Query<LogParams>,
) -> Json<LogResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Json(LogResponse {
        entries: ctx.controller.log_entries(limit).await,
    })
}

/// POST /maintenance/sweep - Delete stored files outside the retention window
pub async fn sweep(State(ctx): State<AppContext>) -> Json<SweepResponse> {
    let report = ctx.controller.sweep().await;
    info!(
        "Manual sweep: {} evicted, {} failed",
        report.evicted.len(),
        report.failed.len()
    );
    Json(SweepResponse {
        evicted: report.evicted.len(),
        failed: report.failed.len(),
    })
}
