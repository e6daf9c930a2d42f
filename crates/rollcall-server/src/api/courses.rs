//! Course endpoints: listing, creation, enrollment and attendance sheets.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rollcall_core::{
    normalize_course_code, Course, CourseAttendanceSheet, CourseListing, Enrollment, LecturerId,
    NewCourse,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::auth::{AuthUser, LecturerUser, Role, StudentUser};
use crate::state::SharedState;

/// Creates the courses router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/{course_code}/enroll", post(enroll))
        .route("/{course_code}/attendance", get(attendance_sheet))
}

/// The caller's courses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseListResponse {
    /// Taught courses for a lecturer, enrolled courses for a student,
    /// ordered by course code.
    pub courses: Vec<CourseListing>,

    /// Number of courses listed.
    #[schema(example = 2)]
    pub total_courses: usize,

    /// Sum of their credit units.
    #[schema(example = 6)]
    pub total_credits: i64,
}

/// List the caller's courses.
#[utoipa::path(
    get,
    path = "/api/courses",
    tag = "courses",
    operation_id = "listCourses",
    summary = "List the caller's courses",
    description = "Lecturers get the courses they teach, each with its number of \
        enrolled students. Students get the courses they are enrolled in.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Course list", body = CourseListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn list_courses(
    State(state): State<SharedState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<CourseListResponse>> {
    let courses = match claims.role {
        Role::Student => state.directory.courses_for_student(&claims.sub).await?,
        Role::Lecturer => {
            let lecturer_id: LecturerId = claims
                .sub
                .parse()
                .map_err(|_| ApiError::unauthorized("Lecturer token subject is not an id."))?;
            state.directory.courses_for_lecturer(lecturer_id).await?
        }
    };

    let total_credits = courses.iter().map(|c| i64::from(c.course_credits)).sum();
    Ok(Json(CourseListResponse {
        total_courses: courses.len(),
        total_credits,
        courses,
    }))
}

/// Create or join a course.
#[utoipa::path(
    post,
    path = "/api/courses",
    tag = "courses",
    operation_id = "createCourse",
    summary = "Create a course",
    description = "Creates the course if it does not exist and associates the \
        calling lecturer with it. If another lecturer already created it, the \
        caller joins the existing course and the submitted details are ignored.",
    request_body = NewCourse,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Course created or joined", body = Course),
        (status = 400, description = "Invalid course code or already associated", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Caller has no lecturer profile", body = ErrorResponse)
    )
)]
pub async fn create_course(
    State(state): State<SharedState>,
    lecturer: LecturerUser,
    ApiJson(course): ApiJson<NewCourse>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let course = state
        .directory
        .create_course(lecturer.lecturer_id, course, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// Enroll the caller in a course.
#[utoipa::path(
    post,
    path = "/api/courses/{course_code}/enroll",
    tag = "courses",
    operation_id = "enrollInCourse",
    summary = "Enroll in a course",
    params(
        ("course_code" = String, Path, description = "Course code", example = "CSC301")
    ),
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Already enrolled", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Student or course not found", body = ErrorResponse)
    )
)]
pub async fn enroll(
    State(state): State<SharedState>,
    student: StudentUser,
    Path(course_code): Path<String>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let course_code = normalize_course_code(&course_code)?;
    let enrollment = state
        .directory
        .enroll(&student.matric_number, &course_code)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Attendance sheet for a course the caller teaches.
#[utoipa::path(
    get,
    path = "/api/courses/{course_code}/attendance",
    tag = "courses",
    operation_id = "courseAttendance",
    summary = "Get a course attendance sheet",
    description = "Every enrolled student with their status on each of the five \
        most recent dates that have records. Students with no record on a date \
        are shown Absent.",
    params(
        ("course_code" = String, Path, description = "Course code", example = "CSC301")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Attendance sheet", body = CourseAttendanceSheet),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller does not teach the course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
pub async fn attendance_sheet(
    State(state): State<SharedState>,
    lecturer: LecturerUser,
    Path(course_code): Path<String>,
) -> ApiResult<Json<CourseAttendanceSheet>> {
    let course_code = normalize_course_code(&course_code)?;
    let sheet = state
        .stats
        .course_sheet(&course_code, lecturer.lecturer_id)
        .await?;
    Ok(Json(sheet))
}
