//! Unified error types for the rollcall core library.
//!
//! [`AttendanceError`] covers every way a scan, a code generation or a
//! directory operation can be refused. Each variant maps to exactly one HTTP
//! status and one machine-readable code, so callers never need a second
//! lookup table.
//!
//! Storage backends report failures through [`StoreError`]; the
//! orchestrating components translate uniqueness conflicts into the domain
//! variant that the conflict means in context (a duplicate scan, a
//! rate-limited generation) and wrap everything else in
//! [`AttendanceError::Store`].
//!
//! # Example
//!
//! ```rust
//! use rollcall_core::error::{AttendanceError, Result};
//!
//! fn require_enrolled(enrolled: bool) -> Result<()> {
//!     if !enrolled {
//!         return Err(AttendanceError::NotEnrolled);
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(require_enrolled(false).unwrap_err().http_status_code(), 403);
//! ```

use thiserror::Error;

use crate::types::LecturerId;

/// Failure reported by an [`AttendanceStore`](crate::store::AttendanceStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A uniqueness key was violated by an insert.
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A specialized result for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The unified error type for all attendance operations.
#[derive(Debug, Error)]
pub enum AttendanceError {
    // =========================================================================
    // SCAN VALIDATION
    // =========================================================================
    /// The authenticated caller tried to mark attendance for someone else.
    #[error("You are not authorized to mark attendance for another student.")]
    IdentityMismatch,

    /// No student with this matric number exists.
    #[error("Student not found: '{0}'")]
    StudentNotFound(String),

    /// No course with this code exists.
    #[error("Course not found: '{0}'")]
    CourseNotFound(String),

    /// The student is not enrolled in the course.
    #[error("Student is not enrolled in this course.")]
    NotEnrolled,

    /// No session code exists for the course and lecturer.
    #[error("QR code not found for course '{course_code}' and lecturer {lecturer_id}")]
    SessionNotFound {
        /// Course code that was looked up.
        course_code: String,
        /// Lecturer id that was looked up.
        lecturer_id: LecturerId,
    },

    /// The session window has closed. Absences were reconciled.
    #[error("QR code has expired; you have been marked as absent for this session")]
    SessionExpired {
        /// Number of Absent records created by this reconciliation.
        absences_recorded: u64,
    },

    /// The student already has a record for this session window.
    #[error("You have already marked attendance for this session.")]
    DuplicateAttendance,

    /// The scan location is outside the geofence.
    #[error("Student is not within the valid location range ({distance_meters:.1} m > {max_meters:.1} m).")]
    LocationOutOfRange {
        /// Computed distance in meters.
        distance_meters: f64,
        /// Configured geofence in meters.
        max_meters: f64,
    },

    /// Coordinates were non-finite or outside the degree range.
    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates {
        /// Submitted latitude.
        latitude: f64,
        /// Submitted longitude.
        longitude: f64,
    },

    // =========================================================================
    // CODE GENERATION
    // =========================================================================
    /// A code for this course was already generated in the current window.
    #[error("QR Code already generated for this course within the current window. Try again after {retry_after}.")]
    RateLimited {
        /// Earliest time (RFC 3339) a new code will be accepted.
        retry_after: String,
    },

    /// The lecturer is not associated with the course.
    #[error("You are not authorized to perform this action for this course.")]
    NotCourseLecturer,

    /// No lecturer with this id exists.
    #[error("Lecturer not found: {0}")]
    LecturerNotFound(LecturerId),

    // =========================================================================
    // DIRECTORY
    // =========================================================================
    /// An identifier failed format validation.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The student is already enrolled in the course.
    #[error("Student is already enrolled in this course.")]
    AlreadyEnrolled,

    /// The lecturer is already associated with the course.
    #[error("Lecturer already associated with this course.")]
    LecturerAlreadyAssigned,

    /// A student with this matric number already exists.
    #[error("Student Matric Number already registered.")]
    StudentAlreadyExists,

    /// A lecturer with this id already exists.
    #[error("Lecturer already registered.")]
    LecturerAlreadyExists,

    // =========================================================================
    // PERSISTENCE
    // =========================================================================
    /// The data store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A specialized [`Result`] type for attendance operations.
pub type Result<T> = std::result::Result<T, AttendanceError>;

impl AttendanceError {
    /// Returns `true` if this error rejected a scan request.
    #[inline]
    #[must_use]
    pub const fn is_scan_rejection(&self) -> bool {
        matches!(
            self,
            Self::IdentityMismatch
                | Self::StudentNotFound(_)
                | Self::CourseNotFound(_)
                | Self::NotEnrolled
                | Self::SessionNotFound { .. }
                | Self::SessionExpired { .. }
                | Self::DuplicateAttendance
                | Self::LocationOutOfRange { .. }
                | Self::InvalidCoordinates { .. }
        )
    }

    /// Returns `true` if the referenced entity does not exist.
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::StudentNotFound(_)
                | Self::CourseNotFound(_)
                | Self::SessionNotFound { .. }
                | Self::LecturerNotFound(_)
        )
    }

    /// Returns `true` if this error is a server-side failure.
    #[inline]
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns the HTTP status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input or repeated creation
            Self::RateLimited { .. }
            | Self::InvalidCoordinates { .. }
            | Self::InvalidIdentifier(_)
            | Self::AlreadyEnrolled
            | Self::LecturerAlreadyAssigned
            | Self::StudentAlreadyExists
            | Self::LecturerAlreadyExists => 400,

            // 403 Forbidden - understood but refused
            Self::IdentityMismatch
            | Self::NotEnrolled
            | Self::NotCourseLecturer
            | Self::SessionExpired { .. }
            | Self::DuplicateAttendance => 403,

            // 404 Not Found
            Self::StudentNotFound(_)
            | Self::CourseNotFound(_)
            | Self::SessionNotFound { .. }
            | Self::LecturerNotFound(_) => 404,

            // 422 Unprocessable Entity - outside the geofence
            Self::LocationOutOfRange { .. } => 422,

            // 500 Internal Server Error
            Self::Store(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::IdentityMismatch => "IDENTITY_MISMATCH",
            Self::StudentNotFound(_) => "STUDENT_NOT_FOUND",
            Self::CourseNotFound(_) => "COURSE_NOT_FOUND",
            Self::NotEnrolled => "NOT_ENROLLED",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::SessionExpired { .. } => "SESSION_EXPIRED",
            Self::DuplicateAttendance => "DUPLICATE_ATTENDANCE",
            Self::LocationOutOfRange { .. } => "LOCATION_OUT_OF_RANGE",
            Self::InvalidCoordinates { .. } => "INVALID_COORDINATES",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotCourseLecturer => "NOT_COURSE_LECTURER",
            Self::LecturerNotFound(_) => "LECTURER_NOT_FOUND",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::AlreadyEnrolled => "ALREADY_ENROLLED",
            Self::LecturerAlreadyAssigned => "LECTURER_ALREADY_ASSIGNED",
            Self::StudentAlreadyExists => "STUDENT_ALREADY_EXISTS",
            Self::LecturerAlreadyExists => "LECTURER_ALREADY_EXISTS",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert_eq!(AttendanceError::IdentityMismatch.http_status_code(), 403);
        assert_eq!(
            AttendanceError::StudentNotFound("x".into()).http_status_code(),
            404
        );
        assert_eq!(
            AttendanceError::CourseNotFound("x".into()).http_status_code(),
            404
        );
        assert_eq!(
            AttendanceError::SessionNotFound {
                course_code: "CSC301".into(),
                lecturer_id: 1
            }
            .http_status_code(),
            404
        );
        assert_eq!(AttendanceError::NotEnrolled.http_status_code(), 403);
        assert_eq!(
            AttendanceError::SessionExpired {
                absences_recorded: 3
            }
            .http_status_code(),
            403
        );
        assert_eq!(AttendanceError::DuplicateAttendance.http_status_code(), 403);
        assert_eq!(
            AttendanceError::LocationOutOfRange {
                distance_meters: 120.0,
                max_meters: 50.0
            }
            .http_status_code(),
            422
        );
        assert_eq!(
            AttendanceError::RateLimited {
                retry_after: "2025-03-03T11:00:00Z".into()
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            AttendanceError::Store(StoreError::Backend("down".into())).http_status_code(),
            500
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AttendanceError::DuplicateAttendance.error_code(),
            "DUPLICATE_ATTENDANCE"
        );
        assert_eq!(
            AttendanceError::SessionExpired {
                absences_recorded: 0
            }
            .error_code(),
            "SESSION_EXPIRED"
        );
        assert_eq!(AttendanceError::NotCourseLecturer.error_code(), "NOT_COURSE_LECTURER");
    }

    #[test]
    fn test_classification() {
        assert!(AttendanceError::NotEnrolled.is_scan_rejection());
        assert!(!AttendanceError::AlreadyEnrolled.is_scan_rejection());
        assert!(AttendanceError::LecturerNotFound(3).is_not_found());
        assert!(!AttendanceError::NotEnrolled.is_not_found());
        assert!(AttendanceError::from(StoreError::Conflict("k".into())).is_internal());
    }

    #[test]
    fn test_error_display_messages() {
        let err = AttendanceError::SessionExpired {
            absences_recorded: 2,
        };
        assert!(err.to_string().contains("expired"));

        let err = AttendanceError::LocationOutOfRange {
            distance_meters: 1234.56,
            max_meters: 50.0,
        };
        assert!(err.to_string().contains("1234.6 m"));

        let err = AttendanceError::Store(StoreError::Backend("disk full".into()));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AttendanceError>();
        assert_sync::<AttendanceError>();
    }
}
