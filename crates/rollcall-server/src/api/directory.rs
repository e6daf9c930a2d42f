//! Profile registration.
//!
//! Identities come from the bearer token; these endpoints only attach a
//! profile to them.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rollcall_core::{AttendanceError, Lecturer, Student};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::auth::{LecturerUser, StudentUser};
use crate::state::SharedState;

/// Creates the students router.
pub fn students_router() -> Router<SharedState> {
    Router::new().route("/", post(register_student))
}

/// Creates the lecturers router.
pub fn lecturers_router() -> Router<SharedState> {
    Router::new().route("/", post(register_lecturer))
}

/// Lecturer profile details. The id is taken from the token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Dr. Bello",
    "email": "bello@example.edu",
    "department": "Computer Science"
}))]
pub struct RegisterLecturerRequest {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Department.
    pub department: String,
}

/// Register the caller's student profile.
#[utoipa::path(
    post,
    path = "/api/students",
    tag = "directory",
    operation_id = "registerStudent",
    summary = "Register a student profile",
    description = "The matric number must equal the token subject.",
    request_body = Student,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Profile created", body = Student),
        (status = 400, description = "Already registered or invalid identifier", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Matric number is not the caller's", body = ErrorResponse)
    )
)]
pub async fn register_student(
    State(state): State<SharedState>,
    caller: StudentUser,
    ApiJson(student): ApiJson<Student>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    if student.matric_number != caller.matric_number {
        return Err(AttendanceError::IdentityMismatch.into());
    }
    let student = state.directory.register_student(student).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// Register the caller's lecturer profile.
#[utoipa::path(
    post,
    path = "/api/lecturers",
    tag = "directory",
    operation_id = "registerLecturer",
    summary = "Register a lecturer profile",
    request_body = RegisterLecturerRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Profile created", body = Lecturer),
        (status = 400, description = "Already registered or invalid email", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn register_lecturer(
    State(state): State<SharedState>,
    caller: LecturerUser,
    ApiJson(request): ApiJson<RegisterLecturerRequest>,
) -> ApiResult<(StatusCode, Json<Lecturer>)> {
    let lecturer = state
        .directory
        .register_lecturer(Lecturer {
            id: caller.lecturer_id,
            name: request.name,
            email: request.email,
            department: request.department,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(lecturer)))
}
