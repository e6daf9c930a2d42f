//! SeaORM-backed store.
//!
//! Uniqueness keys are unique indexes in the schema, so concurrent writers
//! racing on the same key get exactly one success; the losers surface as
//! [`StoreError::Conflict`].
//!
//! Session and attendance timestamps are stored as epoch milliseconds so
//! that SQL can order, range-filter and key on them. Values written through
//! this store are truncated to millisecond precision.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use super::AttendanceStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    AttendanceRecord, AttendanceStatus, Course, Enrollment, Lecturer, LecturerId,
    NewAttendanceRecord, NewSessionCode, SessionCode, Student,
};

mod entity;
mod migration;

use entity::{
    attendance_record, course, course_lecturer, enrollment, lecturer, session_code, student,
};
use migration::Migrator;

fn map_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Conflict(detail),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {ms}")))
}

/// Create the parent directory of a file-backed SQLite URL.
fn ensure_sqlite_dir(url: &str) -> StoreResult<()> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(':') {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("{}: {e}", parent.display())))?;
        }
    }
    Ok(())
}

/// A store over a SeaORM connection.
#[derive(Debug, Clone)]
pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    /// Connect to `url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection or a migration fails.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        ensure_sqlite_dir(url)?;

        let mut options = ConnectOptions::new(url.to_owned());
        options.sqlx_logging(false);
        let db = Database::connect(options).await.map_err(map_err)?;

        Migrator::up(&db, None).await.map_err(map_err)?;
        info!(url = %url, "Database ready");

        Ok(Self { db })
    }

    /// Wrap an existing, already migrated connection.
    #[must_use]
    pub const fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<student::Model> for Student {
    fn from(m: student::Model) -> Self {
        Self {
            matric_number: m.matric_number,
            full_name: m.full_name,
            email: m.email,
        }
    }
}

impl From<lecturer::Model> for Lecturer {
    fn from(m: lecturer::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            department: m.department,
        }
    }
}

impl From<course::Model> for Course {
    fn from(m: course::Model) -> Self {
        Self {
            course_code: m.course_code,
            course_name: m.course_name,
            course_credits: m.course_credits,
            semester: m.semester,
            created_at: m.created_at,
        }
    }
}

impl TryFrom<session_code::Model> for SessionCode {
    type Error = StoreError;

    fn try_from(m: session_code::Model) -> StoreResult<Self> {
        Ok(Self {
            id: m.id,
            course_code: m.course_code,
            lecturer_id: m.lecturer_id,
            generated_at: from_millis(m.generated_at)?,
            latitude: m.latitude,
            longitude: m.longitude,
            rate_window_start: from_millis(m.rate_window_start)?,
            url: m.url,
        })
    }
}

impl TryFrom<attendance_record::Model> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(m: attendance_record::Model) -> StoreResult<Self> {
        let status: AttendanceStatus = m.status.parse().map_err(StoreError::Backend)?;
        Ok(Self {
            id: m.id,
            matric_number: m.matric_number,
            course_code: m.course_code,
            recorded_at: from_millis(m.recorded_at)?,
            status,
            geo_location: m.geo_location,
            window_start: from_millis(m.window_start)?,
        })
    }
}

fn to_records(models: Vec<attendance_record::Model>) -> StoreResult<Vec<AttendanceRecord>> {
    models.into_iter().map(AttendanceRecord::try_from).collect()
}

#[async_trait]
impl AttendanceStore for SqlStore {
    async fn find_student(&self, matric_number: &str) -> StoreResult<Option<Student>> {
        let found = student::Entity::find_by_id(matric_number.to_owned())
            .one(&self.db)
            .await
            .map_err(map_err)?;
        Ok(found.map(Student::from))
    }

    async fn insert_student(&self, s: Student) -> StoreResult<Student> {
        let model = student::ActiveModel {
            matric_number: Set(s.matric_number),
            full_name: Set(s.full_name),
            email: Set(s.email),
        };
        let inserted = model.insert(&self.db).await.map_err(map_err)?;
        Ok(inserted.into())
    }

    async fn find_lecturer(&self, lecturer_id: LecturerId) -> StoreResult<Option<Lecturer>> {
        let found = lecturer::Entity::find_by_id(lecturer_id)
            .one(&self.db)
            .await
            .map_err(map_err)?;
        Ok(found.map(Lecturer::from))
    }

    async fn insert_lecturer(&self, l: Lecturer) -> StoreResult<Lecturer> {
        let model = lecturer::ActiveModel {
            id: Set(l.id),
            name: Set(l.name),
            email: Set(l.email),
            department: Set(l.department),
        };
        let inserted = model.insert(&self.db).await.map_err(map_err)?;
        Ok(inserted.into())
    }

    async fn find_course(&self, course_code: &str) -> StoreResult<Option<Course>> {
        let found = course::Entity::find_by_id(course_code.to_owned())
            .one(&self.db)
            .await
            .map_err(map_err)?;
        Ok(found.map(Course::from))
    }

    async fn insert_course(&self, c: Course) -> StoreResult<Course> {
        let model = course::ActiveModel {
            course_code: Set(c.course_code),
            course_name: Set(c.course_name),
            course_credits: Set(c.course_credits),
            semester: Set(c.semester),
            created_at: Set(c.created_at),
        };
        let inserted = model.insert(&self.db).await.map_err(map_err)?;
        Ok(inserted.into())
    }

    async fn assign_lecturer(
        &self,
        lecturer_id: LecturerId,
        course_code: &str,
    ) -> StoreResult<()> {
        let model = course_lecturer::ActiveModel {
            lecturer_id: Set(lecturer_id),
            course_code: Set(course_code.to_owned()),
        };
        model.insert(&self.db).await.map_err(map_err)?;
        Ok(())
    }

    async fn is_course_lecturer(
        &self,
        lecturer_id: LecturerId,
        course_code: &str,
    ) -> StoreResult<bool> {
        let found = course_lecturer::Entity::find_by_id((lecturer_id, course_code.to_owned()))
            .one(&self.db)
            .await
            .map_err(map_err)?;
        Ok(found.is_some())
    }

    async fn list_courses_for_student(&self, matric_number: &str) -> StoreResult<Vec<Course>> {
        let rows = enrollment::Entity::find()
            .filter(enrollment::Column::MatricNumber.eq(matric_number))
            .find_also_related(course::Entity)
            .order_by_asc(enrollment::Column::CourseCode)
            .all(&self.db)
            .await
            .map_err(map_err)?;
        Ok(rows
            .into_iter()
            .filter_map(|(_, c)| c.map(Course::from))
            .collect())
    }

    async fn list_courses_for_lecturer(
        &self,
        lecturer_id: LecturerId,
    ) -> StoreResult<Vec<Course>> {
        let rows = course_lecturer::Entity::find()
            .filter(course_lecturer::Column::LecturerId.eq(lecturer_id))
            .find_also_related(course::Entity)
            .order_by_asc(course_lecturer::Column::CourseCode)
            .all(&self.db)
            .await
            .map_err(map_err)?;
        Ok(rows
            .into_iter()
            .filter_map(|(_, c)| c.map(Course::from))
            .collect())
    }

    async fn find_enrollment(
        &self,
        matric_number: &str,
        course_code: &str,
    ) -> StoreResult<Option<Enrollment>> {
        let found =
            enrollment::Entity::find_by_id((matric_number.to_owned(), course_code.to_owned()))
                .one(&self.db)
                .await
                .map_err(map_err)?;
        Ok(found.map(|m| Enrollment {
            matric_number: m.matric_number,
            course_code: m.course_code,
        }))
    }

    async fn insert_enrollment(&self, e: Enrollment) -> StoreResult<Enrollment> {
        let model = enrollment::ActiveModel {
            matric_number: Set(e.matric_number.clone()),
            course_code: Set(e.course_code.clone()),
        };
        model.insert(&self.db).await.map_err(map_err)?;
        Ok(e)
    }

    async fn list_enrolled(&self, course_code: &str) -> StoreResult<Vec<String>> {
        let rows = enrollment::Entity::find()
            .filter(enrollment::Column::CourseCode.eq(course_code))
            .order_by_asc(enrollment::Column::MatricNumber)
            .all(&self.db)
            .await
            .map_err(map_err)?;
        Ok(rows.into_iter().map(|m| m.matric_number).collect())
    }

    async fn count_enrolled(&self, course_code: &str) -> StoreResult<u64> {
        enrollment::Entity::find()
            .filter(enrollment::Column::CourseCode.eq(course_code))
            .count(&self.db)
            .await
            .map_err(map_err)
    }

    async fn find_latest_session(
        &self,
        course_code: &str,
        lecturer_id: LecturerId,
    ) -> StoreResult<Option<SessionCode>> {
        session_code::Entity::find()
            .filter(session_code::Column::CourseCode.eq(course_code))
            .filter(session_code::Column::LecturerId.eq(lecturer_id))
            .order_by_desc(session_code::Column::GeneratedAt)
            .order_by_desc(session_code::Column::Id)
            .one(&self.db)
            .await
            .map_err(map_err)?
            .map(SessionCode::try_from)
            .transpose()
    }

    async fn find_latest_session_for_course(
        &self,
        course_code: &str,
    ) -> StoreResult<Option<SessionCode>> {
        session_code::Entity::find()
            .filter(session_code::Column::CourseCode.eq(course_code))
            .order_by_desc(session_code::Column::GeneratedAt)
            .order_by_desc(session_code::Column::Id)
            .one(&self.db)
            .await
            .map_err(map_err)?
            .map(SessionCode::try_from)
            .transpose()
    }

    async fn insert_session(&self, code: NewSessionCode) -> StoreResult<SessionCode> {
        let model = session_code::ActiveModel {
            course_code: Set(code.course_code),
            lecturer_id: Set(code.lecturer_id),
            generated_at: Set(to_millis(code.generated_at)),
            latitude: Set(code.coordinates.latitude),
            longitude: Set(code.coordinates.longitude),
            rate_window_start: Set(to_millis(code.rate_window_start)),
            url: Set(code.url),
            ..Default::default()
        };
        let inserted = model.insert(&self.db).await.map_err(map_err)?;
        debug!(id = inserted.id, course = %inserted.course_code, "Stored session code");
        inserted.try_into()
    }

    async fn list_sessions_since(
        &self,
        lecturer_id: LecturerId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SessionCode>> {
        session_code::Entity::find()
            .filter(session_code::Column::LecturerId.eq(lecturer_id))
            .filter(session_code::Column::GeneratedAt.gte(to_millis(since)))
            .order_by_desc(session_code::Column::GeneratedAt)
            .order_by_desc(session_code::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_err)?
            .into_iter()
            .map(SessionCode::try_from)
            .collect()
    }

    async fn count_sessions(&self, course_code: &str) -> StoreResult<u64> {
        session_code::Entity::find()
            .filter(session_code::Column::CourseCode.eq(course_code))
            .count(&self.db)
            .await
            .map_err(map_err)
    }

    async fn find_attendance(
        &self,
        matric_number: &str,
        course_code: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>> {
        attendance_record::Entity::find()
            .filter(attendance_record::Column::MatricNumber.eq(matric_number))
            .filter(attendance_record::Column::CourseCode.eq(course_code))
            .filter(attendance_record::Column::WindowStart.eq(to_millis(window_start)))
            .one(&self.db)
            .await
            .map_err(map_err)?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn list_present(
        &self,
        course_code: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<Vec<String>> {
        let rows = attendance_record::Entity::find()
            .filter(attendance_record::Column::CourseCode.eq(course_code))
            .filter(attendance_record::Column::WindowStart.eq(to_millis(window_start)))
            .filter(attendance_record::Column::Status.eq(AttendanceStatus::Present.as_str()))
            .order_by_asc(attendance_record::Column::MatricNumber)
            .all(&self.db)
            .await
            .map_err(map_err)?;
        Ok(rows.into_iter().map(|m| m.matric_number).collect())
    }

    async fn insert_attendance(
        &self,
        record: NewAttendanceRecord,
    ) -> StoreResult<AttendanceRecord> {
        let model = attendance_record::ActiveModel {
            matric_number: Set(record.matric_number),
            course_code: Set(record.course_code),
            recorded_at: Set(to_millis(record.recorded_at)),
            status: Set(record.status.as_str().to_owned()),
            geo_location: Set(record.geo_location),
            window_start: Set(to_millis(record.window_start)),
            ..Default::default()
        };
        let inserted = model.insert(&self.db).await.map_err(map_err)?;
        inserted.try_into()
    }

    async fn list_attendance_for_course(
        &self,
        course_code: &str,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let rows = attendance_record::Entity::find()
            .filter(attendance_record::Column::CourseCode.eq(course_code))
            .order_by_asc(attendance_record::Column::RecordedAt)
            .order_by_asc(attendance_record::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_err)?;
        to_records(rows)
    }

    async fn list_attendance_for_student(
        &self,
        matric_number: &str,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let rows = attendance_record::Entity::find()
            .filter(attendance_record::Column::MatricNumber.eq(matric_number))
            .order_by_asc(attendance_record::Column::RecordedAt)
            .order_by_asc(attendance_record::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_err)?;
        to_records(rows)
    }
}
