//! Streaming gateway endpoints called by the schedule service.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use lectern_common::stream::{StreamRequest, StreamResponse, START_STREAM_PATH, STOP_STREAM_PATH};

use crate::auth::middleware::ServiceCaller;
use crate::encoder::{ActiveEncode, StopOutcome};
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(START_STREAM_PATH, post(start_stream))
        .route(STOP_STREAM_PATH, post(stop_stream))
        .route("/live/stream/active", get(list_active))
}

fn session_id(body: &StreamRequest) -> Result<&str, ApiError> {
    let id = body.session_id.trim();
    if id.is_empty() {
        return Err(ApiError::bad_request("session_id is required"));
    }
    // The id becomes a directory name under the HLS root.
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::bad_request("session_id contains invalid characters"));
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// POST /live/stream/start-stream
// ---------------------------------------------------------------------------

/// Spawn the encoder for a session and return its delivery URL.
#[utoipa::path(
    post,
    path = "/live/stream/start-stream",
    tag = "Stream",
    security(("bearer" = []), ("gateway_key" = [])),
    request_body = StreamRequest,
    responses(
        (status = 200, description = "Encoder started", body = StreamResponse),
        (status = 400, description = "Invalid session id", body = ApiErrorBody),
        (status = 401, description = "Missing or invalid credentials", body = ApiErrorBody),
        (status = 409, description = "Session already encoding", body = StreamResponse),
        (status = 500, description = "Encoder could not be spawned", body = StreamResponse),
    ),
)]
pub async fn start_stream(
    _caller: ServiceCaller,
    State(state): State<AppState>,
    Json(body): Json<StreamRequest>,
) -> Result<Json<StreamResponse>, ApiError> {
    let session_id = session_id(&body)?;
    let started = state.gateway.start(session_id).await?;
    Ok(Json(StreamResponse::started(started.url, started.stream_key)))
}

// ---------------------------------------------------------------------------
// POST /live/stream/stop-stream
// ---------------------------------------------------------------------------

/// Terminate the encoder for a session. Stopping an idle session succeeds.
#[utoipa::path(
    post,
    path = "/live/stream/stop-stream",
    tag = "Stream",
    security(("bearer" = []), ("gateway_key" = [])),
    request_body = StreamRequest,
    responses(
        (status = 200, description = "Encoder stopped or already stopped", body = StreamResponse),
        (status = 400, description = "Invalid session id", body = ApiErrorBody),
        (status = 401, description = "Missing or invalid credentials", body = ApiErrorBody),
        (status = 500, description = "Encoder could not be terminated", body = StreamResponse),
    ),
)]
pub async fn stop_stream(
    _caller: ServiceCaller,
    State(state): State<AppState>,
    Json(body): Json<StreamRequest>,
) -> Result<Json<StreamResponse>, ApiError> {
    let session_id = session_id(&body)?;
    let message = match state.gateway.stop(session_id).await? {
        StopOutcome::Stopped => "stopped",
        StopOutcome::AlreadyStopped => "already stopped",
    };
    Ok(Json(StreamResponse::ok(message)))
}

// ---------------------------------------------------------------------------
// GET /live/stream/active
// ---------------------------------------------------------------------------

/// List sessions with a running encoder.
#[utoipa::path(
    get,
    path = "/live/stream/active",
    tag = "Stream",
    security(("bearer" = []), ("gateway_key" = [])),
    responses(
        (status = 200, description = "Running encodes", body = Vec<ActiveEncode>),
        (status = 401, description = "Missing or invalid credentials", body = ApiErrorBody),
    ),
)]
pub async fn list_active(
    _caller: ServiceCaller,
    State(state): State<AppState>,
) -> Json<Vec<ActiveEncode>> {
    Json(state.gateway.active())
}
