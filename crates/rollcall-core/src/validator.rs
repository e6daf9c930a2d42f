//! Scan validation pipeline.
//!
//! A scan passes through these stages in order and stops at the first
//! failure:
//!
//! 1. identity: the submitted matric number is the caller's own
//! 2. the student exists
//! 3. the course exists
//! 4. the student is enrolled in the course
//! 5. the lecturer has generated a code for the course
//! 6. that code is still live; if not, absences for its window are
//!    reconciled before the scan is rejected
//! 7. the student has no record for that code's window yet
//! 8. the submitted coordinates are valid and inside the geofence
//! 9. a Present record is committed
//!
//! Records are keyed on the window they belong to, which opens at the code's
//! generation time. A record written for another lecturer's window never
//! blocks a scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::error::{AttendanceError, Result, StoreError};
use crate::geo::GeoValidator;
use crate::reconciler::AbsenceReconciler;
use crate::store::SharedStore;
use crate::types::{AttendanceRecord, AttendanceStatus, Coordinates, LecturerId, NewAttendanceRecord};
use crate::window::SessionWindow;

/// A student's scan of a session code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "matric_number": "CSC/2021/001",
    "course_code": "CSC301",
    "lecturer_id": 7,
    "latitude": 6.5244,
    "longitude": 3.3792
}))]
pub struct ScanRequest {
    /// Matric number the scan is for. Must be the caller's own.
    pub matric_number: String,

    /// Course printed on the code.
    pub course_code: String,

    /// Lecturer who generated the code.
    pub lecturer_id: LecturerId,

    /// Student's latitude.
    pub latitude: f64,

    /// Student's longitude.
    pub longitude: f64,
}

/// Runs the scan stages against a store.
#[derive(Clone)]
pub struct AttendanceValidator {
    store: SharedStore,
    window: SessionWindow,
    geo: GeoValidator,
    reconciler: AbsenceReconciler,
}

impl std::fmt::Debug for AttendanceValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceValidator")
            .field("window", &self.window)
            .field("geo", &self.geo)
            .finish_non_exhaustive()
    }
}

impl AttendanceValidator {
    /// Create a validator. The reconciler shares the validator's window.
    #[must_use]
    pub fn new(store: SharedStore, window: SessionWindow, geo: GeoValidator) -> Self {
        Self {
            reconciler: AbsenceReconciler::new(store.clone(), window),
            store,
            window,
            geo,
        }
    }

    /// Validate a scan by `caller` and, if every stage passes, record the
    /// student Present.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage. On an expired code this
    /// is [`AttendanceError::SessionExpired`] after absences have been
    /// recorded, unless reconciliation itself failed, in which case that
    /// failure is returned.
    #[instrument(
        skip(self, request),
        fields(student = %request.matric_number, course = %request.course_code)
    )]
    pub async fn scan(
        &self,
        caller: &str,
        request: &ScanRequest,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        if request.matric_number != caller {
            warn!(caller, "Scan submitted for another student");
            return Err(AttendanceError::IdentityMismatch);
        }

        let student = self
            .store
            .find_student(&request.matric_number)
            .await?
            .ok_or_else(|| AttendanceError::StudentNotFound(request.matric_number.clone()))?;

        let course = self
            .store
            .find_course(&request.course_code)
            .await?
            .ok_or_else(|| AttendanceError::CourseNotFound(request.course_code.clone()))?;

        if self
            .store
            .find_enrollment(&student.matric_number, &course.course_code)
            .await?
            .is_none()
        {
            return Err(AttendanceError::NotEnrolled);
        }

        let session = self
            .store
            .find_latest_session(&course.course_code, request.lecturer_id)
            .await?
            .ok_or_else(|| AttendanceError::SessionNotFound {
                course_code: course.course_code.clone(),
                lecturer_id: request.lecturer_id,
            })?;

        if !self.window.is_live(session.generated_at, now) {
            debug!(
                generated_at = %session.generated_at,
                expired_at = %self.window.expires_at(session.generated_at),
                "Session expired"
            );
            let absences_recorded = self
                .reconciler
                .reconcile(&course.course_code, session.generated_at, now)
                .await?;
            return Err(AttendanceError::SessionExpired { absences_recorded });
        }

        if self
            .store
            .find_attendance(
                &student.matric_number,
                &course.course_code,
                session.generated_at,
            )
            .await?
            .is_some()
        {
            return Err(AttendanceError::DuplicateAttendance);
        }

        let location = Coordinates::new(request.latitude, request.longitude)?;
        let distance = self.geo.check(location, session.coordinates())?;

        let record = NewAttendanceRecord {
            matric_number: student.matric_number,
            course_code: course.course_code,
            recorded_at: now,
            status: AttendanceStatus::Present,
            geo_location: Some(location.to_string()),
            window_start: session.generated_at,
        };

        match self.store.insert_attendance(record).await {
            Ok(stored) => {
                info!(distance_meters = distance, "Attendance marked");
                Ok(stored)
            }
            Err(StoreError::Conflict(_)) => Err(AttendanceError::DuplicateAttendance),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use crate::error::StoreResult;
    use crate::store::{AttendanceStore, MemoryStore};
    use crate::types::{Course, Enrollment, Lecturer, NewSessionCode, SessionCode, Student};

    const HALL: (f64, f64) = (6.5244, 3.3792);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 10, 5, 0).unwrap()
    }

    fn request(matric: &str) -> ScanRequest {
        ScanRequest {
            matric_number: matric.into(),
            course_code: "CSC301".into(),
            lecturer_id: 7,
            latitude: HALL.0,
            longitude: HALL.1,
        }
    }

    fn validator(store: SharedStore) -> AttendanceValidator {
        AttendanceValidator::new(
            store,
            SessionWindow::new(Duration::minutes(60)),
            GeoValidator::new(50.0, Some(2)),
        )
    }

    /// One course, one lecturer, students A and B enrolled, C registered but
    /// not enrolled. A code is generated at `t0` in the lecture hall unless
    /// `with_code` is false.
    async fn campus(with_code: bool) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for m in ["A", "B", "C"] {
            store
                .insert_student(Student {
                    matric_number: m.into(),
                    full_name: format!("Student {m}"),
                    email: format!("{m}@example.edu"),
                })
                .await
                .unwrap();
        }
        store
            .insert_lecturer(Lecturer {
                id: 7,
                name: "Dr. Bello".into(),
                email: "bello@example.edu".into(),
                department: "Computer Science".into(),
            })
            .await
            .unwrap();
        store
            .insert_course(Course {
                course_code: "CSC301".into(),
                course_name: "Data Structures".into(),
                course_credits: 3,
                semester: "First".into(),
                created_at: t0(),
            })
            .await
            .unwrap();
        store.assign_lecturer(7, "CSC301").await.unwrap();
        for m in ["A", "B"] {
            store
                .insert_enrollment(Enrollment {
                    matric_number: m.into(),
                    course_code: "CSC301".into(),
                })
                .await
                .unwrap();
        }
        if with_code {
            store
                .insert_session(NewSessionCode {
                    course_code: "CSC301".into(),
                    lecturer_id: 7,
                    generated_at: t0(),
                    coordinates: Coordinates::new(HALL.0, HALL.1).unwrap(),
                    rate_window_start: t0(),
                    url: "http://localhost/".into(),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_valid_scan_marks_present() {
        let store = campus(true).await;
        let validator = validator(store.clone());

        let now = t0() + Duration::minutes(5);
        let record = validator.scan("A", &request("A"), now).await.unwrap();

        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.recorded_at, now);
        assert_eq!(record.window_start, t0());
        assert_eq!(record.geo_location.as_deref(), Some("6.5244,3.3792"));
    }

    #[tokio::test]
    async fn test_second_scan_in_window_is_duplicate() {
        let store = campus(true).await;
        let validator = validator(store.clone());

        validator
            .scan("A", &request("A"), t0() + Duration::minutes(5))
            .await
            .unwrap();
        let err = validator
            .scan("A", &request("A"), t0() + Duration::minutes(6))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::DuplicateAttendance));
        assert_eq!(store.list_attendance_for_student("A").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_scan_reconciles_and_rejects() {
        let store = campus(true).await;
        let validator = validator(store.clone());

        validator
            .scan("A", &request("A"), t0() + Duration::minutes(5))
            .await
            .unwrap();

        let late = t0() + Duration::minutes(61);
        let err = validator.scan("B", &request("B"), late).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::SessionExpired {
                absences_recorded: 1
            }
        ));

        let b = store.list_attendance_for_student("B").await.unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].status, AttendanceStatus::Absent);
        assert_eq!(b[0].recorded_at, late);
        assert_eq!(b[0].geo_location, None);

        // A keeps exactly one Present record
        let a = store.list_attendance_for_student("A").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].status, AttendanceStatus::Present);

        // a second late scan changes nothing
        let err = validator
            .scan("B", &request("B"), late + Duration::minutes(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::SessionExpired {
                absences_recorded: 0
            }
        ));
        assert_eq!(store.list_attendance_for_course("CSC301").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_boundary_scan_is_live() {
        let store = campus(true).await;
        let validator = validator(store.clone());
        let record = validator
            .scan("A", &request("A"), t0() + Duration::minutes(60))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn test_identity_mismatch_writes_nothing() {
        let store = campus(true).await;
        let validator = validator(store.clone());

        let err = validator
            .scan("B", &request("A"), t0() + Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::IdentityMismatch));
        assert!(store
            .list_attendance_for_course("CSC301")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_identity_checked_before_existence() {
        let store = campus(true).await;
        let validator = validator(store.clone());

        // neither student exists, identity still fails first
        let err = validator
            .scan("ghost", &request("phantom"), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::IdentityMismatch));
    }

    #[tokio::test]
    async fn test_not_found_stages() {
        let store = campus(false).await;
        let validator = validator(store.clone());

        let err = validator.scan("Z", &request("Z"), t0()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::StudentNotFound(_)));

        let mut req = request("A");
        req.course_code = "MTH101".into();
        let err = validator.scan("A", &req, t0()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::CourseNotFound(_)));

        let err = validator.scan("C", &request("C"), t0()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NotEnrolled));

        let err = validator.scan("A", &request("A"), t0()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_writes_nothing() {
        let store = campus(true).await;
        let validator = validator(store.clone());

        let mut req = request("A");
        req.latitude = 6.60;
        let err = validator
            .scan("A", &req, t0() + Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::LocationOutOfRange { .. }));
        assert_eq!(err.http_status_code(), 422);
        assert!(store.list_attendance_for_student("A").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_coordinates_checked_at_geofence_stage() {
        let store = campus(true).await;
        let validator = validator(store.clone());

        let mut req = request("A");
        req.longitude = 200.0;
        // an earlier stage failing wins over bad coordinates
        let err = validator.scan("B", &req, t0()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::IdentityMismatch));

        let err = validator
            .scan("A", &req, t0() + Duration::minutes(90))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::SessionExpired {
                absences_recorded: 2
            }
        ));

        let store = campus(true).await;
        let validator = self::validator(store.clone());
        let err = validator
            .scan("A", &req, t0() + Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidCoordinates { .. }));
        assert!(store.list_attendance_for_student("A").await.unwrap().is_empty());
    }

    async fn add_lecturer_code(store: &MemoryStore, lecturer_id: LecturerId, at: DateTime<Utc>) {
        store
            .insert_lecturer(Lecturer {
                id: lecturer_id,
                name: format!("Lecturer {lecturer_id}"),
                email: format!("l{lecturer_id}@example.edu"),
                department: "Computer Science".into(),
            })
            .await
            .unwrap();
        store.assign_lecturer(lecturer_id, "CSC301").await.unwrap();
        store
            .insert_session(NewSessionCode {
                course_code: "CSC301".into(),
                lecturer_id,
                generated_at: at,
                coordinates: Coordinates::new(HALL.0, HALL.1).unwrap(),
                rate_window_start: at,
                url: "http://localhost/".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_absence_in_other_lecturers_window_does_not_block_scan() {
        let store = campus(true).await;
        let validator = validator(store.clone());
        let second = t0() + Duration::minutes(70);
        add_lecturer_code(&store, 8, second).await;

        // B scans lecturer 7's closed code; A and B are marked absent for it
        let err = validator
            .scan("B", &request("B"), second + Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::SessionExpired {
                absences_recorded: 2
            }
        ));

        let mut req = request("A");
        req.lecturer_id = 8;
        let record = validator
            .scan("A", &req, second + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.window_start, second);

        let mut a: Vec<_> = store
            .list_attendance_for_student("A")
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.window_start, r.status))
            .collect();
        a.sort();
        assert_eq!(
            a,
            vec![
                (t0(), AttendanceStatus::Absent),
                (second, AttendanceStatus::Present),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_identical_scans_record_once() {
        let store = campus(true).await;
        let validator = validator(store.clone());
        let req = request("A");
        let now = t0() + Duration::minutes(5);

        let (first, second) = tokio::join!(
            validator.scan("A", &req, now),
            validator.scan("A", &req, now)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AttendanceError::DuplicateAttendance)))
                .count(),
            1
        );
        let records = store.list_attendance_for_student("A").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn test_scan_uses_newest_code() {
        let store = campus(true).await;
        let validator = validator(store.clone());
        let next = t0() + Duration::hours(3);
        store
            .insert_session(NewSessionCode {
                course_code: "CSC301".into(),
                lecturer_id: 7,
                generated_at: next,
                coordinates: Coordinates::new(HALL.0, HALL.1).unwrap(),
                rate_window_start: next,
                url: "http://localhost/".into(),
            })
            .await
            .unwrap();

        let record = validator
            .scan("A", &request("A"), next + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(record.window_start, next);
    }

    /// Delegates to a [`MemoryStore`] but fails every attendance insert,
    /// either with a uniqueness conflict or a backend error.
    struct FailingInserts(MemoryStore, bool);

    #[async_trait]
    impl AttendanceStore for FailingInserts {
        async fn find_student(&self, m: &str) -> StoreResult<Option<Student>> {
            self.0.find_student(m).await
        }
        async fn insert_student(&self, s: Student) -> StoreResult<Student> {
            self.0.insert_student(s).await
        }
        async fn find_lecturer(&self, id: LecturerId) -> StoreResult<Option<Lecturer>> {
            self.0.find_lecturer(id).await
        }
        async fn insert_lecturer(&self, l: Lecturer) -> StoreResult<Lecturer> {
            self.0.insert_lecturer(l).await
        }
        async fn find_course(&self, c: &str) -> StoreResult<Option<Course>> {
            self.0.find_course(c).await
        }
        async fn insert_course(&self, c: Course) -> StoreResult<Course> {
            self.0.insert_course(c).await
        }
        async fn assign_lecturer(&self, id: LecturerId, c: &str) -> StoreResult<()> {
            self.0.assign_lecturer(id, c).await
        }
        async fn is_course_lecturer(&self, id: LecturerId, c: &str) -> StoreResult<bool> {
            self.0.is_course_lecturer(id, c).await
        }
        async fn list_courses_for_student(&self, m: &str) -> StoreResult<Vec<Course>> {
            self.0.list_courses_for_student(m).await
        }
        async fn list_courses_for_lecturer(&self, id: LecturerId) -> StoreResult<Vec<Course>> {
            self.0.list_courses_for_lecturer(id).await
        }
        async fn find_enrollment(&self, m: &str, c: &str) -> StoreResult<Option<Enrollment>> {
            self.0.find_enrollment(m, c).await
        }
        async fn insert_enrollment(&self, e: Enrollment) -> StoreResult<Enrollment> {
            self.0.insert_enrollment(e).await
        }
        async fn list_enrolled(&self, c: &str) -> StoreResult<Vec<String>> {
            self.0.list_enrolled(c).await
        }
        async fn count_enrolled(&self, c: &str) -> StoreResult<u64> {
            self.0.count_enrolled(c).await
        }
        async fn find_latest_session(
            &self,
            c: &str,
            id: LecturerId,
        ) -> StoreResult<Option<SessionCode>> {
            self.0.find_latest_session(c, id).await
        }
        async fn find_latest_session_for_course(&self, c: &str) -> StoreResult<Option<SessionCode>> {
            self.0.find_latest_session_for_course(c).await
        }
        async fn insert_session(&self, code: NewSessionCode) -> StoreResult<SessionCode> {
            self.0.insert_session(code).await
        }
        async fn list_sessions_since(
            &self,
            id: LecturerId,
            since: DateTime<Utc>,
        ) -> StoreResult<Vec<SessionCode>> {
            self.0.list_sessions_since(id, since).await
        }
        async fn count_sessions(&self, c: &str) -> StoreResult<u64> {
            self.0.count_sessions(c).await
        }
        async fn find_attendance(
            &self,
            m: &str,
            c: &str,
            window_start: DateTime<Utc>,
        ) -> StoreResult<Option<AttendanceRecord>> {
            self.0.find_attendance(m, c, window_start).await
        }
        async fn list_present(
            &self,
            c: &str,
            window_start: DateTime<Utc>,
        ) -> StoreResult<Vec<String>> {
            self.0.list_present(c, window_start).await
        }
        async fn insert_attendance(&self, _: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
            if self.1 {
                Err(StoreError::Conflict("uq_attendance_records_window".into()))
            } else {
                Err(StoreError::Backend("disk full".into()))
            }
        }
        async fn list_attendance_for_course(&self, c: &str) -> StoreResult<Vec<AttendanceRecord>> {
            self.0.list_attendance_for_course(c).await
        }
        async fn list_attendance_for_student(
            &self,
            m: &str,
        ) -> StoreResult<Vec<AttendanceRecord>> {
            self.0.list_attendance_for_student(m).await
        }
    }

    #[tokio::test]
    async fn test_reconcile_failure_propagates() {
        let seeded = Arc::try_unwrap(campus(true).await).unwrap();
        let validator = validator(Arc::new(FailingInserts(seeded, false)));

        let err = validator
            .scan("A", &request("A"), t0() + Duration::hours(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Store(StoreError::Backend(_))));
        assert_eq!(err.http_status_code(), 500);
    }

    #[tokio::test]
    async fn test_insert_conflict_is_duplicate() {
        // another scan for the same window committed between stages 7 and 9
        let seeded = Arc::try_unwrap(campus(true).await).unwrap();
        let validator = validator(Arc::new(FailingInserts(seeded, true)));

        let err = validator
            .scan("A", &request("A"), t0() + Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::DuplicateAttendance));
        assert_eq!(err.http_status_code(), 403);
    }
}
