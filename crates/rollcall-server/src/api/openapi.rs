//! OpenAPI specification for the rollcall API.
//!
//! Served at `/api/openapi.json` with a browsable UI at `/swagger-ui`, and
//! written to `openapi.json` by the `gen-openapi` binary for client
//! generation.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use rollcall_core::{
    AttendanceRecord, AttendanceStatus, Course, CourseAttendanceSheet, CourseAttendanceSummary,
    CourseListing, Enrollment, Lecturer, NewCourse, ScanRequest, SessionCode, Student,
    StudentAttendanceRow,
};

use super::attendance::{MyAttendanceResponse, ScanResponse};
use super::courses::CourseListResponse;
use super::directory::RegisterLecturerRequest;
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::sessions::{GenerateSessionRequest, RecentSessionsResponse};

/// Name of the bearer security scheme referenced by handlers.
pub const BEARER_SCHEME: &str = "bearer";

/// Returns the OpenAPI specification as pretty JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            BEARER_SCHEME,
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Main OpenAPI document structure for rollcall.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rollcall API",
        version = "0.1.0",
        description = r#"
# rollcall API

Location-verified class attendance.

## Flow

1. A lecturer generates a **session code** for a course at the lecture hall.
   The code records where and when it was generated.
2. Students scan the code. A scan is accepted when the caller is enrolled,
   the newest code for the course is still within its validity window, and
   the caller is within the geofence of where the code was generated.
3. The first scan after the window closes marks every enrolled student who
   did not scan as **Absent**.

## Authentication

Every `/api` endpoint needs `Authorization: Bearer <jwt>` signed with the
shared HS256 secret. Claims: `sub` (matric number or lecturer id),
`role` (`student` or `lecturer`), `exp`.

## Errors

Failures return `{error, message, details}` where `error` is a stable
machine-readable code such as `SESSION_EXPIRED`.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local rollcall server")
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "Health checks"),
        (name = "sessions", description = "Session code generation and lookup"),
        (name = "attendance", description = "Scanning and attendance scores"),
        (name = "courses", description = "Course creation, enrollment and attendance sheets"),
        (name = "directory", description = "Student and lecturer profiles")
    ),
    paths(
        super::health::health_check,
        super::sessions::generate_session,
        super::sessions::recent_sessions,
        super::sessions::latest_session,
        super::attendance::scan,
        super::attendance::my_attendance,
        super::courses::list_courses,
        super::courses::create_course,
        super::courses::enroll,
        super::courses::attendance_sheet,
        super::directory::register_student,
        super::directory::register_lecturer,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            GenerateSessionRequest,
            RecentSessionsResponse,
            SessionCode,
            ScanRequest,
            ScanResponse,
            MyAttendanceResponse,
            CourseAttendanceSummary,
            CourseAttendanceSheet,
            StudentAttendanceRow,
            AttendanceRecord,
            AttendanceStatus,
            NewCourse,
            Course,
            CourseListing,
            CourseListResponse,
            Enrollment,
            Student,
            Lecturer,
            RegisterLecturerRequest,
        )
    )
)]
pub struct ApiDoc;
