//! Data store abstraction.
//!
//! The core never talks to a database directly. Everything it needs is
//! expressed by [`AttendanceStore`], which has two implementations:
//!
//! - [`MemoryStore`] - in-process maps behind a `tokio` lock, used by tests
//!   and by `database.url = "memory"`
//! - [`SqlStore`] - SeaORM over SQLite (feature `sqlite`)
//!
//! Both enforce the same uniqueness keys, and report a violated key as
//! [`StoreError::Conflict`](crate::error::StoreError::Conflict):
//!
//! | record | key |
//! |---|---|
//! | student | matric number |
//! | lecturer | id |
//! | course | course code |
//! | course lecturer | (lecturer, course) |
//! | enrollment | (student, course) |
//! | session code | (course, lecturer, rate window start) |
//! | attendance | (student, course, window start) |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::{
    AttendanceRecord, Course, Enrollment, Lecturer, LecturerId, NewAttendanceRecord,
    NewSessionCode, SessionCode, Student,
};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sql;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sql::SqlStore;

/// Shared handle to a store.
pub type SharedStore = Arc<dyn AttendanceStore>;

/// Record lookup and insert operations consumed by the attendance core.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    // --- directory ---

    /// Look up a student by matric number.
    async fn find_student(&self, matric_number: &str) -> StoreResult<Option<Student>>;

    /// Insert a student.
    async fn insert_student(&self, student: Student) -> StoreResult<Student>;

    /// Look up a lecturer by id.
    async fn find_lecturer(&self, lecturer_id: LecturerId) -> StoreResult<Option<Lecturer>>;

    /// Insert a lecturer.
    async fn insert_lecturer(&self, lecturer: Lecturer) -> StoreResult<Lecturer>;

    /// Look up a course by code.
    async fn find_course(&self, course_code: &str) -> StoreResult<Option<Course>>;

    /// Insert a course.
    async fn insert_course(&self, course: Course) -> StoreResult<Course>;

    /// Associate a lecturer with a course.
    async fn assign_lecturer(&self, lecturer_id: LecturerId, course_code: &str)
        -> StoreResult<()>;

    /// Whether the lecturer is associated with the course.
    async fn is_course_lecturer(
        &self,
        lecturer_id: LecturerId,
        course_code: &str,
    ) -> StoreResult<bool>;

    /// Courses the student is enrolled in, ordered by course code.
    async fn list_courses_for_student(&self, matric_number: &str) -> StoreResult<Vec<Course>>;

    /// Courses the lecturer is associated with, ordered by course code.
    async fn list_courses_for_lecturer(&self, lecturer_id: LecturerId)
        -> StoreResult<Vec<Course>>;

    // --- enrollment ---

    /// Look up an enrollment.
    async fn find_enrollment(
        &self,
        matric_number: &str,
        course_code: &str,
    ) -> StoreResult<Option<Enrollment>>;

    /// Insert an enrollment.
    async fn insert_enrollment(&self, enrollment: Enrollment) -> StoreResult<Enrollment>;

    /// Matric numbers enrolled in a course, sorted.
    async fn list_enrolled(&self, course_code: &str) -> StoreResult<Vec<String>>;

    /// Number of students enrolled in a course.
    async fn count_enrolled(&self, course_code: &str) -> StoreResult<u64>;

    // --- session codes ---

    /// Most recent code for (course, lecturer).
    async fn find_latest_session(
        &self,
        course_code: &str,
        lecturer_id: LecturerId,
    ) -> StoreResult<Option<SessionCode>>;

    /// Most recent code for a course across lecturers.
    async fn find_latest_session_for_course(
        &self,
        course_code: &str,
    ) -> StoreResult<Option<SessionCode>>;

    /// Insert a session code.
    async fn insert_session(&self, code: NewSessionCode) -> StoreResult<SessionCode>;

    /// Codes generated by a lecturer at or after `since`, newest first.
    async fn list_sessions_since(
        &self,
        lecturer_id: LecturerId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SessionCode>>;

    /// Number of codes ever generated for a course.
    async fn count_sessions(&self, course_code: &str) -> StoreResult<u64>;

    // --- attendance ---

    /// The record for (student, course) in the session window that opened
    /// at `window_start`, if any.
    async fn find_attendance(
        &self,
        matric_number: &str,
        course_code: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>>;

    /// Matric numbers marked Present in the course's window that opened at
    /// `window_start`, sorted.
    async fn list_present(
        &self,
        course_code: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<Vec<String>>;

    /// Insert an attendance record.
    async fn insert_attendance(&self, record: NewAttendanceRecord)
        -> StoreResult<AttendanceRecord>;

    /// All records for a course, oldest first.
    async fn list_attendance_for_course(
        &self,
        course_code: &str,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    /// All records for a student, oldest first.
    async fn list_attendance_for_student(
        &self,
        matric_number: &str,
    ) -> StoreResult<Vec<AttendanceRecord>>;
}
