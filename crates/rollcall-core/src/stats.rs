//! Attendance reports for lecturers and students.

use std::collections::{BTreeMap, BTreeSet};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AttendanceError, Result};
use crate::store::SharedStore;
use crate::types::{AttendanceRecord, AttendanceStatus, LecturerId};

/// Number of most recent dates shown on a course sheet.
pub const SHEET_DATES: usize = 5;

/// One row of a course attendance sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StudentAttendanceRow {
    /// Student matric number.
    pub matric_number: String,
    /// Student name.
    pub full_name: String,
    /// Status per date (`YYYY-MM-DD`), Absent when no record exists.
    pub attendance: BTreeMap<String, AttendanceStatus>,
}

/// Attendance of every enrolled student over the most recent dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "course_code": "CSC301",
    "course_name": "Data Structures",
    "dates": ["2025-03-10", "2025-03-03"],
    "students": [{
        "matric_number": "CSC/2021/001",
        "full_name": "Ada Obi",
        "attendance": {"2025-03-03": "Present", "2025-03-10": "Absent"}
    }]
}))]
pub struct CourseAttendanceSheet {
    /// Course code.
    pub course_code: String,
    /// Course title.
    pub course_name: String,
    /// Dates covered, newest first.
    pub dates: Vec<String>,
    /// One row per enrolled student, ordered by matric number.
    pub students: Vec<StudentAttendanceRow>,
}

/// A student's standing in one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "course_code": "CSC301",
    "course_name": "Data Structures",
    "course_credits": 3,
    "semester": "First",
    "attended_sessions": 9,
    "total_sessions": 12,
    "attendance_score": 75.0
}))]
pub struct CourseAttendanceSummary {
    /// Course code.
    pub course_code: String,
    /// Course title.
    pub course_name: String,
    /// Credit units.
    pub course_credits: i32,
    /// Semester label.
    pub semester: String,
    /// Sessions the student was Present for.
    pub attended_sessions: u64,
    /// Codes generated for the course.
    pub total_sessions: u64,
    /// Percentage attended, capped at 100 and rounded to 2 places.
    pub attendance_score: f64,
}

/// `attended / total` as a percentage, capped at 100, rounded to 2 places.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn attendance_percentage(attended: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = (attended as f64 / total as f64 * 100.0).min(100.0);
    (pct * 100.0).round() / 100.0
}

/// Builds attendance reports from the store.
#[derive(Clone)]
pub struct AttendanceStats {
    store: SharedStore,
    tz: Tz,
}

impl std::fmt::Debug for AttendanceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceStats")
            .field("tz", &self.tz)
            .finish_non_exhaustive()
    }
}

impl AttendanceStats {
    /// Create a report builder. Dates are bucketed in `tz`.
    #[must_use]
    pub const fn new(store: SharedStore, tz: Tz) -> Self {
        Self { store, tz }
    }

    /// Attendance sheet for a course taught by `lecturer_id`.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::CourseNotFound`] if the course does not exist
    /// - [`AttendanceError::NotCourseLecturer`] if the lecturer does not teach it
    pub async fn course_sheet(
        &self,
        course_code: &str,
        lecturer_id: LecturerId,
    ) -> Result<CourseAttendanceSheet> {
        let course = self
            .store
            .find_course(course_code)
            .await?
            .ok_or_else(|| AttendanceError::CourseNotFound(course_code.to_string()))?;
        if !self.store.is_course_lecturer(lecturer_id, course_code).await? {
            return Err(AttendanceError::NotCourseLecturer);
        }

        let records = self.store.list_attendance_for_course(course_code).await?;
        let day = |r: &AttendanceRecord| {
            r.recorded_at
                .with_timezone(&self.tz)
                .format("%Y-%m-%d")
                .to_string()
        };

        let all_dates: BTreeSet<String> = records.iter().map(day).collect();
        let dates: Vec<String> = all_dates.into_iter().rev().take(SHEET_DATES).collect();

        let mut students = Vec::new();
        for matric_number in self.store.list_enrolled(course_code).await? {
            let full_name = self
                .store
                .find_student(&matric_number)
                .await?
                .map(|s| s.full_name)
                .unwrap_or_default();

            let mut attendance: BTreeMap<String, AttendanceStatus> = dates
                .iter()
                .map(|d| (d.clone(), AttendanceStatus::Absent))
                .collect();
            for record in records.iter().filter(|r| r.matric_number == matric_number) {
                if record.status == AttendanceStatus::Present {
                    if let Some(slot) = attendance.get_mut(&day(record)) {
                        *slot = AttendanceStatus::Present;
                    }
                }
            }

            students.push(StudentAttendanceRow {
                matric_number,
                full_name,
                attendance,
            });
        }

        Ok(CourseAttendanceSheet {
            course_code: course.course_code,
            course_name: course.course_name,
            dates,
            students,
        })
    }

    /// Per-course attendance score for a student, ordered by course code.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::StudentNotFound`] if the student does not exist.
    pub async fn student_summary(&self, matric_number: &str) -> Result<Vec<CourseAttendanceSummary>> {
        if self.store.find_student(matric_number).await?.is_none() {
            return Err(AttendanceError::StudentNotFound(matric_number.to_string()));
        }

        let records = self.store.list_attendance_for_student(matric_number).await?;
        let mut summaries = Vec::new();
        for course in self.store.list_courses_for_student(matric_number).await? {
            let attended = records
                .iter()
                .filter(|r| r.course_code == course.course_code)
                .filter(|r| r.status == AttendanceStatus::Present)
                .count() as u64;
            let total = self.store.count_sessions(&course.course_code).await?;

            summaries.push(CourseAttendanceSummary {
                attendance_score: attendance_percentage(attended, total),
                course_code: course.course_code,
                course_name: course.course_name,
                course_credits: course.course_credits,
                semester: course.semester,
                attended_sessions: attended,
                total_sessions: total,
            });
        }
        Ok(summaries)
    }
}
