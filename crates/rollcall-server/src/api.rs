//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `attendance` - scanning and per-student scores
//! - `sessions` - session code generation and lookup
//! - `courses` - course creation, enrollment and attendance sheets
//! - `directory` - student and lecturer profiles
//! - `health` - service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod attendance;
pub mod courses;
pub mod directory;
pub mod error;
pub mod extract;
pub mod health;
pub mod openapi;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::{get_openapi_json, ApiDoc};

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                              - Health check
/// /swagger-ui                          - Browsable API documentation
/// /api
/// ├── /openapi.json                    - OpenAPI specification
/// ├── /attendance/scan                 - Scan a session code (student)
/// ├── /attendance/me                   - Caller's attendance scores (student)
/// ├── /sessions                        - Generate a code (lecturer)
/// ├── /sessions/recent                 - Caller's live codes (lecturer)
/// ├── /sessions/{course_code}/latest   - Latest code for a course
/// ├── /students, /lecturers            - Profile registration
/// ├── /courses                         - List own courses; create or join one (lecturer)
/// ├── /courses/{course_code}/enroll    - Enroll (student)
/// └── /courses/{course_code}/attendance - Attendance sheet (lecturer)
/// ```
pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(state.config.server.cors_origin.as_deref());

    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .nest("/attendance", attendance::router())
                .nest("/sessions", sessions::router())
                .nest("/courses", courses::router())
                .nest("/students", directory::students_router())
                .nest("/lecturers", directory::lecturers_router()),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS for the configured front-end origin; same-origin only when unset.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!(error = %e, "Ignoring invalid CORS origin");
            layer
        }
        None => layer,
    }
}
