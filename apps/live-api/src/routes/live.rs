//! Live session endpoints: scheduling, status changes and viewer counts.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::BearerToken;
use crate::db::SessionFilter;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::live_session::{Attendee, LiveSession, LiveStatus};
use crate::schedule::NewSchedule;
use crate::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_DURATION_MINUTES: i32 = 24 * 60;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/live", post(create_session).get(list_sessions))
        .route("/live/{session_id}", get(get_session))
        .route("/live/{session_id}/status", patch(change_status))
        .route("/live/{session_id}/check", get(check_can_start))
        .route("/live/rooms/{room_id}/viewers", get(room_viewers))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLiveSessionRequest {
    pub tutor_id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: LiveStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<LiveStatus>,
    pub tutor_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveSessionDetail {
    #[serde(flatten)]
    pub session: LiveSession,
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CanStartResponse {
    #[serde(rename = "canStart")]
    pub can_start: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewerCountResponse {
    pub room_id: String,
    pub count: usize,
}

fn validate_create(body: CreateLiveSessionRequest) -> Result<NewSchedule, ApiError> {
    let title = body.title.trim().to_string();
    let tutor_id = body.tutor_id.trim().to_string();
    let course_id = body.course_id.trim().to_string();

    let mut errors = Vec::new();
    if title.is_empty() {
        errors.push(FieldError::new("title", "Title is required"));
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(FieldError::new(
            "title",
            format!("Title must be {MAX_TITLE_LEN} characters or fewer"),
        ));
    }
    if tutor_id.is_empty() {
        errors.push(FieldError::new("tutor_id", "Tutor is required"));
    }
    if course_id.is_empty() {
        errors.push(FieldError::new("course_id", "Course is required"));
    }
    if !(1..=MAX_DURATION_MINUTES).contains(&body.duration_minutes) {
        errors.push(FieldError::new(
            "duration_minutes",
            format!("Duration must be between 1 and {MAX_DURATION_MINUTES} minutes"),
        ));
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    Ok(NewSchedule {
        tutor_id,
        course_id,
        title,
        description: body.description.filter(|d| !d.trim().is_empty()),
        scheduled_at: body.scheduled_at,
        duration_minutes: body.duration_minutes,
    })
}

// ---------------------------------------------------------------------------
// POST /live
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/live",
    tag = "Live",
    request_body = CreateLiveSessionRequest,
    responses(
        (status = 201, description = "Session scheduled", body = LiveSession),
        (status = 400, description = "Validation error", body = ApiErrorBody),
    ),
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateLiveSessionRequest>,
) -> Result<(StatusCode, Json<LiveSession>), ApiError> {
    let input = validate_create(body)?;
    let session = state.schedule.create(input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

// ---------------------------------------------------------------------------
// GET /live
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/live",
    tag = "Live",
    params(
        ("status" = Option<LiveStatus>, Query, description = "Filter by status"),
        ("tutor_id" = Option<String>, Query, description = "Filter by tutor"),
    ),
    responses(
        (status = 200, description = "Sessions ordered by scheduled time", body = Vec<LiveSession>),
    ),
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<LiveSession>>, ApiError> {
    let filter = SessionFilter {
        status: params.status,
        tutor_id: params.tutor_id.filter(|t| !t.is_empty()),
    };
    Ok(Json(state.schedule.list(&filter).await?))
}

// ---------------------------------------------------------------------------
// GET /live/{session_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/live/{session_id}",
    tag = "Live",
    params(("session_id" = String, Path, description = "Live session ID")),
    responses(
        (status = 200, description = "Session with attendees", body = LiveSessionDetail),
        (status = 404, description = "Session not found", body = ApiErrorBody),
    ),
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<LiveSessionDetail>, ApiError> {
    let session = state.schedule.get(&session_id).await?;
    let attendees = state.schedule.attendees(&session_id).await?;
    Ok(Json(LiveSessionDetail { session, attendees }))
}

// ---------------------------------------------------------------------------
// PATCH /live/{session_id}/status
// ---------------------------------------------------------------------------

/// Move a session along its lifecycle, starting or stopping the stream.
#[utoipa::path(
    patch,
    path = "/live/{session_id}/status",
    tag = "Live",
    security(("bearer" = [])),
    params(("session_id" = String, Path, description = "Live session ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = LiveSession),
        (status = 401, description = "Missing bearer token", body = ApiErrorBody),
        (status = 404, description = "Session not found", body = ApiErrorBody),
        (status = 409, description = "Invalid transition or too early to start", body = ApiErrorBody),
        (status = 502, description = "Streaming gateway could not start the stream", body = ApiErrorBody),
    ),
)]
pub async fn change_status(
    BearerToken(bearer): BearerToken,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<LiveSession>, ApiError> {
    let session = state
        .schedule
        .change_status(&session_id, body.status, &bearer)
        .await?;
    Ok(Json(session))
}

// ---------------------------------------------------------------------------
// GET /live/{session_id}/check
// ---------------------------------------------------------------------------

/// Whether the start window for a session is open.
#[utoipa::path(
    get,
    path = "/live/{session_id}/check",
    tag = "Live",
    params(("session_id" = String, Path, description = "Live session ID")),
    responses(
        (status = 200, description = "Start window state", body = CanStartResponse),
        (status = 404, description = "Session not found", body = ApiErrorBody),
    ),
)]
pub async fn check_can_start(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CanStartResponse>, ApiError> {
    let can_start = state.schedule.check_can_start(&session_id).await?;
    Ok(Json(CanStartResponse { can_start }))
}

// ---------------------------------------------------------------------------
// GET /live/rooms/{room_id}/viewers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/live/rooms/{room_id}/viewers",
    tag = "Live",
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Current viewer count", body = ViewerCountResponse),
    ),
)]
pub async fn room_viewers(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Json<ViewerCountResponse> {
    let count = state.presence.count(&room_id);
    Json(ViewerCountResponse { room_id, count })
}
