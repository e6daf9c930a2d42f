//! # rollcall-core
//!
//! Core business logic for the rollcall attendance system.
//!
//! Lecturers generate location-tagged, time-bounded session codes per course;
//! students scan them to be marked Present, subject to identity, enrollment,
//! time-window and geofence checks. Students who never scan are marked
//! Absent once the window closes.
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`geo`] - haversine distance and the geofence check
//! - [`window`] - session liveness
//! - [`registry`] - session code generation with rate limiting, latest-code lookup
//! - [`validator`] - the scan pipeline
//! - [`reconciler`] - idempotent absence marking for closed windows
//! - [`directory`] - student, lecturer, course and enrollment registration
//! - [`stats`] - attendance sheets and per-student scores
//! - [`store`] - the [`AttendanceStore`] trait with memory and SQL backends
//! - [`config`] - layered configuration loading and validation
//! - [`error`] - unified error types for the crate
//! - [`types`] - shared records and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod directory;
pub mod error;
pub mod geo;
pub mod reconciler;
pub mod registry;
pub mod stats;
pub mod store;
pub mod types;
pub mod validator;
pub mod window;

// Re-export primary types for convenience
pub use config::{
    is_valid_timezone, AttendanceConfig, AuthConfig, Config, ConfigError, ConfigResult,
    DatabaseConfig, QrConfig, RateLimitPolicy, ServerConfig,
};
pub use directory::{
    normalize_course_code, validate_matric_number, CourseListing, Directory, NewCourse,
};
pub use error::{AttendanceError, Result, StoreError, StoreResult};
pub use geo::{haversine, GeoValidator, EARTH_RADIUS_METERS};
pub use reconciler::AbsenceReconciler;
pub use registry::{rate_window, QrSessionRegistry};
pub use stats::{
    attendance_percentage, AttendanceStats, CourseAttendanceSheet, CourseAttendanceSummary,
    StudentAttendanceRow,
};
#[cfg(feature = "sqlite")]
pub use store::SqlStore;
pub use store::{AttendanceStore, MemoryStore, SharedStore};
pub use types::{
    AttendanceRecord, AttendanceStatus, Coordinates, Course, Enrollment, Lecturer, LecturerId,
    SessionCode, Student,
};
pub use validator::{AttendanceValidator, ScanRequest};
pub use window::SessionWindow;
