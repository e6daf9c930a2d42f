//! Attendance endpoints for students.
//!
//! Scanning a live session code marks the caller Present. A scan against a
//! closed window marks every enrolled student without a record Absent and is
//! refused.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rollcall_core::{normalize_course_code, CourseAttendanceSummary, ScanRequest};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::auth::StudentUser;
use crate::state::SharedState;

/// Message returned for an accepted scan.
pub const SCAN_ACCEPTED: &str = "Attendance marked successfully";

/// Creates the attendance router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scan", post(scan))
        .route("/me", get(my_attendance))
}

/// Response after a successful scan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"message": "Attendance marked successfully"}))]
pub struct ScanResponse {
    /// Confirmation message.
    #[schema(example = "Attendance marked successfully")]
    pub message: String,
}

/// The caller's standing in each enrolled course.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MyAttendanceResponse {
    /// Caller's matric number.
    #[schema(example = "CSC/2021/001")]
    pub matric_number: String,

    /// One entry per enrolled course.
    pub courses: Vec<CourseAttendanceSummary>,
}

/// Scan a session code.
#[utoipa::path(
    post,
    path = "/api/attendance/scan",
    tag = "attendance",
    operation_id = "scanAttendance",
    summary = "Mark attendance by scanning a session code",
    description = "Validates the caller's identity, enrollment, the latest code's \
        time window and the distance from where it was generated. On success the \
        caller is recorded Present. When the window has closed, absent students \
        are recorded and 403 SESSION_EXPIRED is returned.",
    request_body = ScanRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Attendance recorded", body = ScanResponse),
        (status = 400, description = "Invalid coordinates or body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Identity mismatch, not enrolled, expired or duplicate", body = ErrorResponse),
        (status = 404, description = "Student, course or session code not found", body = ErrorResponse),
        (status = 422, description = "Outside the geofence", body = ErrorResponse)
    )
)]
pub async fn scan(
    State(state): State<SharedState>,
    student: StudentUser,
    ApiJson(mut request): ApiJson<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    // an unparseable code falls through to the course lookup
    if let Ok(course_code) = normalize_course_code(&request.course_code) {
        request.course_code = course_code;
    }

    let record = match state
        .validator
        .scan(&student.matric_number, &request, Utc::now())
        .await
    {
        Ok(record) => record,
        Err(e) => {
            if e.is_scan_rejection() {
                info!(
                    student = %student.matric_number,
                    course = %request.course_code,
                    error_code = e.error_code(),
                    "Scan rejected"
                );
            }
            return Err(e.into());
        }
    };

    info!(
        student = %record.matric_number,
        course = %record.course_code,
        window_start = %record.window_start,
        "Attendance recorded"
    );

    Ok(Json(ScanResponse {
        message: SCAN_ACCEPTED.to_string(),
    }))
}

/// Attendance percentage per enrolled course.
#[utoipa::path(
    get,
    path = "/api/attendance/me",
    tag = "attendance",
    operation_id = "myAttendance",
    summary = "Get the caller's attendance scores",
    description = "For each enrolled course: sessions attended, sessions generated \
        and the percentage, capped at 100 and rounded to 2 decimals.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Attendance summary", body = MyAttendanceResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Caller has no student profile", body = ErrorResponse)
    )
)]
pub async fn my_attendance(
    State(state): State<SharedState>,
    student: StudentUser,
) -> ApiResult<Json<MyAttendanceResponse>> {
    let courses = state.stats.student_summary(&student.matric_number).await?;
    Ok(Json(MyAttendanceResponse {
        matric_number: student.matric_number,
        courses,
    }))
}
