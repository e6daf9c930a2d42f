//! In-process store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::AttendanceStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    AttendanceRecord, AttendanceStatus, Course, Enrollment, Lecturer, LecturerId,
    NewAttendanceRecord, NewSessionCode, SessionCode, Student,
};

#[derive(Debug, Default)]
struct Tables {
    students: BTreeMap<String, Student>,
    lecturers: BTreeMap<LecturerId, Lecturer>,
    courses: BTreeMap<String, Course>,
    course_lecturers: BTreeSet<(LecturerId, String)>,
    enrollments: BTreeSet<(String, String)>,
    sessions: Vec<SessionCode>,
    session_keys: HashMap<(String, LecturerId, DateTime<Utc>), i64>,
    attendance: Vec<AttendanceRecord>,
    attendance_keys: HashMap<(String, String, DateTime<Utc>), i64>,
    next_session_id: i64,
    next_attendance_id: i64,
}

/// A store that keeps every table in memory.
///
/// All writes take the single lock, so each insert checks its uniqueness
/// key atomically, the same guarantee a unique index gives the SQL store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn latest<'a>(codes: impl Iterator<Item = &'a SessionCode>) -> Option<SessionCode> {
    codes
        .max_by(|a, b| a.generated_at.cmp(&b.generated_at).then(a.id.cmp(&b.id)))
        .cloned()
}

fn oldest_first<'a>(records: impl Iterator<Item = &'a AttendanceRecord>) -> Vec<AttendanceRecord> {
    let mut records: Vec<AttendanceRecord> = records.cloned().collect();
    records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
    records
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_student(&self, matric_number: &str) -> StoreResult<Option<Student>> {
        Ok(self.tables.read().await.students.get(matric_number).cloned())
    }

    async fn insert_student(&self, student: Student) -> StoreResult<Student> {
        let mut tables = self.tables.write().await;
        if tables.students.contains_key(&student.matric_number) {
            return Err(StoreError::Conflict(format!(
                "student {}",
                student.matric_number
            )));
        }
        tables
            .students
            .insert(student.matric_number.clone(), student.clone());
        Ok(student)
    }

    async fn find_lecturer(&self, lecturer_id: LecturerId) -> StoreResult<Option<Lecturer>> {
        Ok(self.tables.read().await.lecturers.get(&lecturer_id).cloned())
    }

    async fn insert_lecturer(&self, lecturer: Lecturer) -> StoreResult<Lecturer> {
        let mut tables = self.tables.write().await;
        if tables.lecturers.contains_key(&lecturer.id) {
            return Err(StoreError::Conflict(format!("lecturer {}", lecturer.id)));
        }
        tables.lecturers.insert(lecturer.id, lecturer.clone());
        Ok(lecturer)
    }

    async fn find_course(&self, course_code: &str) -> StoreResult<Option<Course>> {
        Ok(self.tables.read().await.courses.get(course_code).cloned())
    }

    async fn insert_course(&self, course: Course) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        if tables.courses.contains_key(&course.course_code) {
            return Err(StoreError::Conflict(format!(
                "course {}",
                course.course_code
            )));
        }
        tables
            .courses
            .insert(course.course_code.clone(), course.clone());
        Ok(course)
    }

    async fn assign_lecturer(
        &self,
        lecturer_id: LecturerId,
        course_code: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables
            .course_lecturers
            .insert((lecturer_id, course_code.to_string()))
        {
            return Err(StoreError::Conflict(format!(
                "lecturer {lecturer_id} on {course_code}"
            )));
        }
        Ok(())
    }

    async fn is_course_lecturer(
        &self,
        lecturer_id: LecturerId,
        course_code: &str,
    ) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .course_lecturers
            .contains(&(lecturer_id, course_code.to_string())))
    }

    async fn list_courses_for_student(&self, matric_number: &str) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .iter()
            .filter(|(student, _)| student == matric_number)
            .filter_map(|(_, course)| tables.courses.get(course).cloned())
            .collect())
    }

    async fn list_courses_for_lecturer(
        &self,
        lecturer_id: LecturerId,
    ) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        Ok(tables
            .course_lecturers
            .iter()
            .filter(|(id, _)| *id == lecturer_id)
            .filter_map(|(_, course)| tables.courses.get(course).cloned())
            .collect())
    }

    async fn find_enrollment(
        &self,
        matric_number: &str,
        course_code: &str,
    ) -> StoreResult<Option<Enrollment>> {
        let key = (matric_number.to_string(), course_code.to_string());
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .contains(&key)
            .then(|| Enrollment {
                matric_number: key.0.clone(),
                course_code: key.1.clone(),
            }))
    }

    async fn insert_enrollment(&self, enrollment: Enrollment) -> StoreResult<Enrollment> {
        let mut tables = self.tables.write().await;
        let key = (
            enrollment.matric_number.clone(),
            enrollment.course_code.clone(),
        );
        if !tables.enrollments.insert(key) {
            return Err(StoreError::Conflict(format!(
                "enrollment {} in {}",
                enrollment.matric_number, enrollment.course_code
            )));
        }
        Ok(enrollment)
    }

    async fn list_enrolled(&self, course_code: &str) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let mut students: Vec<String> = tables
            .enrollments
            .iter()
            .filter(|(_, course)| course == course_code)
            .map(|(student, _)| student.clone())
            .collect();
        students.sort();
        Ok(students)
    }

    async fn count_enrolled(&self, course_code: &str) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        let count = tables
            .enrollments
            .iter()
            .filter(|(_, course)| course == course_code)
            .count();
        Ok(count as u64)
    }

    async fn find_latest_session(
        &self,
        course_code: &str,
        lecturer_id: LecturerId,
    ) -> StoreResult<Option<SessionCode>> {
        let tables = self.tables.read().await;
        Ok(latest(tables.sessions.iter().filter(|code| {
            code.course_code == course_code && code.lecturer_id == lecturer_id
        })))
    }

    async fn find_latest_session_for_course(
        &self,
        course_code: &str,
    ) -> StoreResult<Option<SessionCode>> {
        let tables = self.tables.read().await;
        Ok(latest(
            tables
                .sessions
                .iter()
                .filter(|code| code.course_code == course_code),
        ))
    }

    async fn insert_session(&self, code: NewSessionCode) -> StoreResult<SessionCode> {
        let mut tables = self.tables.write().await;
        let key = (
            code.course_code.clone(),
            code.lecturer_id,
            code.rate_window_start,
        );
        if tables.session_keys.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "session code for {} by {} in window {}",
                code.course_code, code.lecturer_id, code.rate_window_start
            )));
        }

        tables.next_session_id += 1;
        let stored = SessionCode {
            id: tables.next_session_id,
            course_code: code.course_code,
            lecturer_id: code.lecturer_id,
            generated_at: code.generated_at,
            latitude: code.coordinates.latitude,
            longitude: code.coordinates.longitude,
            rate_window_start: code.rate_window_start,
            url: code.url,
        };
        tables.session_keys.insert(key, stored.id);
        tables.sessions.push(stored.clone());
        Ok(stored)
    }

    async fn list_sessions_since(
        &self,
        lecturer_id: LecturerId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SessionCode>> {
        let tables = self.tables.read().await;
        let mut codes: Vec<SessionCode> = tables
            .sessions
            .iter()
            .filter(|code| code.lecturer_id == lecturer_id && code.generated_at >= since)
            .cloned()
            .collect();
        codes.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(codes)
    }

    async fn count_sessions(&self, course_code: &str) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        let count = tables
            .sessions
            .iter()
            .filter(|code| code.course_code == course_code)
            .count();
        Ok(count as u64)
    }

    async fn find_attendance(
        &self,
        matric_number: &str,
        course_code: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let tables = self.tables.read().await;
        let key = (
            matric_number.to_string(),
            course_code.to_string(),
            window_start,
        );
        Ok(tables
            .attendance_keys
            .get(&key)
            .and_then(|id| tables.attendance.iter().find(|record| record.id == *id))
            .cloned())
    }

    async fn list_present(
        &self,
        course_code: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let present: BTreeSet<String> = tables
            .attendance
            .iter()
            .filter(|record| {
                record.course_code == course_code
                    && record.window_start == window_start
                    && record.status == AttendanceStatus::Present
            })
            .map(|record| record.matric_number.clone())
            .collect();
        Ok(present.into_iter().collect())
    }

    async fn insert_attendance(
        &self,
        record: NewAttendanceRecord,
    ) -> StoreResult<AttendanceRecord> {
        let mut tables = self.tables.write().await;
        let key = (
            record.matric_number.clone(),
            record.course_code.clone(),
            record.window_start,
        );
        if tables.attendance_keys.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "attendance for {} in {} at window {}",
                record.matric_number, record.course_code, record.window_start
            )));
        }

        tables.next_attendance_id += 1;
        let stored = AttendanceRecord {
            id: tables.next_attendance_id,
            matric_number: record.matric_number,
            course_code: record.course_code,
            recorded_at: record.recorded_at,
            status: record.status,
            geo_location: record.geo_location,
            window_start: record.window_start,
        };
        tables.attendance_keys.insert(key, stored.id);
        tables.attendance.push(stored.clone());
        Ok(stored)
    }

    async fn list_attendance_for_course(
        &self,
        course_code: &str,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let tables = self.tables.read().await;
        Ok(oldest_first(
            tables
                .attendance
                .iter()
                .filter(|record| record.course_code == course_code),
        ))
    }

    async fn list_attendance_for_student(
        &self,
        matric_number: &str,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let tables = self.tables.read().await;
        Ok(oldest_first(
            tables
                .attendance
                .iter()
                .filter(|record| record.matric_number == matric_number),
        ))
    }
}
