//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_core::AttendanceError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input or a repeated creation.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional structured details.
        details: Option<serde_json::Value>,
    },

    /// 401 Unauthorized - Missing, malformed or expired bearer token.
    Unauthorized {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 403 Forbidden - Authenticated but not allowed.
    Forbidden {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional structured details.
        details: Option<serde_json::Value>,
    },

    /// 404 Not Found - Resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 422 Unprocessable Entity - Well-formed but rejected on its content.
    UnprocessableEntity {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional structured details.
        details: Option<serde_json::Value>,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details (logged, not exposed to the client).
        details: Option<String>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "SESSION_EXPIRED",
    "message": "QR code has expired; you have been marked as absent for this session",
    "details": {"absences_recorded": 12}
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "DUPLICATE_ATTENDANCE").
    #[schema(example = "DUPLICATE_ATTENDANCE")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "You have already marked attendance for this session.")]
    pub message: String,

    /// Optional additional details.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// 401 with the given message.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            error_code: "UNAUTHORIZED".to_string(),
            message: message.into(),
        }
    }

    /// 403 for a caller whose role may not use the endpoint.
    #[must_use]
    pub fn wrong_role(required: &str) -> Self {
        Self::Forbidden {
            error_code: "FORBIDDEN_ROLE".to_string(),
            message: format!("This endpoint requires the {required} role."),
            details: None,
        }
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_response = match self {
            Self::BadRequest {
                error_code,
                message,
                details,
            }
            | Self::Forbidden {
                error_code,
                message,
                details,
            }
            | Self::UnprocessableEntity {
                error_code,
                message,
                details,
            } => ErrorResponse {
                error: error_code,
                message,
                details,
            },

            Self::Unauthorized { error_code, message } | Self::NotFound { error_code, message } => {
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                }
            }

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                // Log internal errors
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                ErrorResponse {
                    error: error_code,
                    message: "An internal error occurred.".to_string(),
                    details: None,
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Unauthorized { message, .. } => write!(f, "Unauthorized: {message}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::UnprocessableEntity { message, .. } => {
                write!(f, "Unprocessable Entity: {message}")
            }
            Self::InternalError { message, .. } => {
                write!(f, "Internal Error: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from rollcall_core errors.
impl From<AttendanceError> for ApiError {
    fn from(err: AttendanceError) -> Self {
        let error_code = err.error_code().to_string();
        let message = err.to_string();

        let details = match &err {
            AttendanceError::SessionExpired { absences_recorded } => {
                Some(json!({ "absences_recorded": absences_recorded }))
            }
            AttendanceError::LocationOutOfRange {
                distance_meters,
                max_meters,
            } => Some(json!({
                "distance_meters": distance_meters,
                "max_meters": max_meters
            })),
            AttendanceError::RateLimited { retry_after } => {
                Some(json!({ "retry_after": retry_after }))
            }
            _ => None,
        };

        if err.is_internal() {
            return Self::InternalError {
                error_code,
                details: Some(message),
                message: "An internal error occurred.".to_string(),
            };
        }
        if err.is_not_found() {
            return Self::NotFound {
                error_code,
                message,
            };
        }

        match err.http_status_code() {
            403 => Self::Forbidden {
                error_code,
                message,
                details,
            },
            422 => Self::UnprocessableEntity {
                error_code,
                message,
                details,
            },
            _ => Self::BadRequest {
                error_code,
                message,
                details,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            error_code: "INVALID_BODY".to_string(),
            message: rejection.body_text(),
            details: None,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            error_code: "INVALID_QUERY".to_string(),
            message: rejection.body_text(),
            details: None,
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest {
            error_code: "INVALID_PATH".to_string(),
            message: rejection.body_text(),
            details: None,
        }
    }
}
