//! Session code endpoints.
//!
//! A lecturer generates a code at the lecture hall; its location and
//! timestamp bound every scan against it. Generation is rate limited per
//! course and lecturer.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use rollcall_core::{normalize_course_code, Coordinates, LecturerId, SessionCode};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::auth::{AuthUser, LecturerUser};
use crate::state::SharedState;

/// Creates the sessions router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(generate_session))
        .route("/recent", get(recent_sessions))
        .route("/{course_code}/latest", get(latest_session))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for generating a session code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "course_code": "CSC301",
    "latitude": 6.5244,
    "longitude": 3.3792
}))]
pub struct GenerateSessionRequest {
    /// Course the code is for.
    #[schema(example = "CSC301")]
    pub course_code: String,

    /// Lecturer's current latitude.
    #[schema(example = 6.5244)]
    pub latitude: f64,

    /// Lecturer's current longitude.
    #[schema(example = 3.3792)]
    pub longitude: f64,
}

/// Query parameters for the latest-code lookup.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestSessionQuery {
    /// Issuing lecturer. When omitted the newest code from any lecturer of
    /// the course is returned.
    #[param(example = 7)]
    pub lecturer_id: Option<LecturerId>,
}

/// Codes still accepting scans.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecentSessionsResponse {
    /// Live codes, newest first.
    pub sessions: Vec<SessionCode>,

    /// Minutes each code stays live.
    #[schema(example = 60)]
    pub validity_minutes: u32,
}

// ============================================================================
// Handlers
// ============================================================================

/// Generate a session code.
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "sessions",
    operation_id = "generateSession",
    summary = "Generate a session code",
    description = "Creates a location-tagged code for a course the caller teaches. \
        Students must scan it within the validity window and within the geofence \
        of the given coordinates. Only one code per course may be generated in \
        each rate-limit window.",
    request_body = GenerateSessionRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Code generated", body = SessionCode),
        (status = 400, description = "Rate limited or invalid input", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller does not teach the course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
pub async fn generate_session(
    State(state): State<SharedState>,
    lecturer: LecturerUser,
    ApiJson(request): ApiJson<GenerateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionCode>)> {
    let course_code = normalize_course_code(&request.course_code)?;
    let at = Coordinates::new(request.latitude, request.longitude)?;

    let code = state
        .registry
        .generate(&course_code, lecturer.lecturer_id, at, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(code)))
}

/// List the caller's live codes.
#[utoipa::path(
    get,
    path = "/api/sessions/recent",
    tag = "sessions",
    operation_id = "recentSessions",
    summary = "List live session codes",
    description = "Returns codes the calling lecturer generated that are still \
        inside their validity window, newest first.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Live codes", body = RecentSessionsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a lecturer", body = ErrorResponse)
    )
)]
pub async fn recent_sessions(
    State(state): State<SharedState>,
    lecturer: LecturerUser,
) -> ApiResult<Json<RecentSessionsResponse>> {
    let sessions = state
        .registry
        .recent_for_issuer(lecturer.lecturer_id, Utc::now())
        .await?;

    Ok(Json(RecentSessionsResponse {
        sessions,
        validity_minutes: state.config.attendance.validity_minutes,
    }))
}

/// Fetch the latest code for a course.
#[utoipa::path(
    get,
    path = "/api/sessions/{course_code}/latest",
    tag = "sessions",
    operation_id = "latestSession",
    summary = "Get the latest session code",
    description = "Returns the newest code for the course, optionally restricted \
        to one lecturer. Older codes are superseded and no longer scannable.",
    params(
        ("course_code" = String, Path, description = "Course code", example = "CSC301"),
        LatestSessionQuery
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Latest code", body = SessionCode),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No code generated yet", body = ErrorResponse)
    )
)]
pub async fn latest_session(
    State(state): State<SharedState>,
    _caller: AuthUser,
    Path(course_code): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<LatestSessionQuery>, ApiError>,
) -> ApiResult<Json<SessionCode>> {
    let course_code = normalize_course_code(&course_code)?;
    let code = match query.lecturer_id {
        Some(lecturer_id) => state.registry.latest(&course_code, lecturer_id).await?,
        None => state.registry.latest_for_course(&course_code).await?,
    };
    Ok(Json(code))
}
