//! Session code registry.
//!
//! A lecturer generates at most one code per course per rate window. The
//! active code for a (course, lecturer) pair is simply the newest one; older
//! codes are superseded but never deleted.

use chrono::{DateTime, Duration, DurationRound, SecondsFormat, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::config::{AttendanceConfig, QrConfig, RateLimitPolicy};
use crate::error::{AttendanceError, Result, StoreError};
use crate::store::SharedStore;
use crate::types::{Coordinates, LecturerId, NewSessionCode, SessionCode};
use crate::window::SessionWindow;

/// The rate window containing `now`, as `(start, end)`.
///
/// For [`RateLimitPolicy::ClockHour`] this is the wall-clock hour in `tz`.
/// For [`RateLimitPolicy::Rolling`] it is the epoch-aligned bucket of the
/// configured length; the bucket start is the uniqueness key that serializes
/// concurrent generation.
#[must_use]
pub fn rate_window(
    policy: RateLimitPolicy,
    tz: Tz,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match policy {
        RateLimitPolicy::ClockHour => {
            let local = now.with_timezone(&tz);
            let start = local
                .date_naive()
                .and_hms_opt(local.hour(), 0, 0)
                .and_then(|naive| tz.from_local_datetime(&naive).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|| now.duration_trunc(Duration::hours(1)).ok())
                .unwrap_or(now);
            (start, start + Duration::hours(1))
        }
        RateLimitPolicy::Rolling { minutes } => {
            let len = i64::from(minutes.max(1)) * 60;
            let secs = now.timestamp();
            let bucket = secs - secs.rem_euclid(len);
            let start = DateTime::from_timestamp(bucket, 0).unwrap_or(now);
            (start, start + Duration::seconds(len))
        }
    }
}

/// Issues session codes and looks up the active one.
#[derive(Clone)]
pub struct QrSessionRegistry {
    store: SharedStore,
    policy: RateLimitPolicy,
    tz: Tz,
    window: SessionWindow,
    base_url: String,
}

impl std::fmt::Debug for QrSessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrSessionRegistry")
            .field("policy", &self.policy)
            .field("tz", &self.tz)
            .field("window", &self.window)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl QrSessionRegistry {
    /// Create a registry over `store`.
    #[must_use]
    pub fn new(store: SharedStore, attendance: &AttendanceConfig, qr: &QrConfig) -> Self {
        Self {
            store,
            policy: attendance.rate_limit,
            tz: attendance.tz(),
            window: SessionWindow::from_config(attendance),
            base_url: qr.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Scan URL encoded into the QR image.
    fn scan_url(
        &self,
        course_code: &str,
        lecturer_id: LecturerId,
        at: Coordinates,
        generated_at: DateTime<Utc>,
    ) -> String {
        format!(
            "{}/?course_code={}&lecturer_id={}&latitude={}&longitude={}&generated_at={}",
            self.base_url,
            course_code,
            lecturer_id,
            at.latitude,
            at.longitude,
            generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// Generate a new code for `course_code` at `at`.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::CourseNotFound`] if the course does not exist
    /// - [`AttendanceError::NotCourseLecturer`] if the lecturer does not teach it
    /// - [`AttendanceError::RateLimited`] if a code already exists in the
    ///   current rate window, including when a concurrent request won the race
    #[instrument(skip(self), fields(course = %course_code, lecturer = lecturer_id))]
    pub async fn generate(
        &self,
        course_code: &str,
        lecturer_id: LecturerId,
        at: Coordinates,
        now: DateTime<Utc>,
    ) -> Result<SessionCode> {
        if self.store.find_course(course_code).await?.is_none() {
            return Err(AttendanceError::CourseNotFound(course_code.to_string()));
        }
        if !self.store.is_course_lecturer(lecturer_id, course_code).await? {
            return Err(AttendanceError::NotCourseLecturer);
        }

        let (window_start, window_end) = rate_window(self.policy, self.tz, now);

        if let Some(latest) = self.store.find_latest_session(course_code, lecturer_id).await? {
            let retry_after = match self.policy {
                RateLimitPolicy::ClockHour => {
                    (latest.generated_at >= window_start).then_some(window_end)
                }
                RateLimitPolicy::Rolling { minutes } => {
                    let until = latest.generated_at + Duration::minutes(i64::from(minutes));
                    (now < until).then_some(until)
                }
            };
            if let Some(retry_after) = retry_after {
                debug!(latest = %latest.generated_at, "Code already generated in this window");
                return Err(rate_limited(retry_after));
            }
        }

        let code = NewSessionCode {
            course_code: course_code.to_string(),
            lecturer_id,
            generated_at: now,
            coordinates: at,
            rate_window_start: window_start,
            url: self.scan_url(course_code, lecturer_id, at, now),
        };

        match self.store.insert_session(code).await {
            Ok(stored) => {
                info!(id = stored.id, "Generated session code");
                Ok(stored)
            }
            Err(StoreError::Conflict(_)) => {
                debug!("Lost generation race for this window");
                Err(rate_limited(window_end))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The active code for (course, lecturer).
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::SessionNotFound`] if none was ever generated.
    pub async fn latest(&self, course_code: &str, lecturer_id: LecturerId) -> Result<SessionCode> {
        self.store
            .find_latest_session(course_code, lecturer_id)
            .await?
            .ok_or_else(|| AttendanceError::SessionNotFound {
                course_code: course_code.to_string(),
                lecturer_id,
            })
    }

    /// The newest code for a course from any lecturer.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::SessionNotFound`] if none was ever generated.
    /// The error carries lecturer id `0` since no lecturer was specified.
    pub async fn latest_for_course(&self, course_code: &str) -> Result<SessionCode> {
        self.store
            .find_latest_session_for_course(course_code)
            .await?
            .ok_or_else(|| AttendanceError::SessionNotFound {
                course_code: course_code.to_string(),
                lecturer_id: 0,
            })
    }

    /// Codes the lecturer generated that are still live at `now`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::Store`] if the lookup fails.
    pub async fn recent_for_issuer(
        &self,
        lecturer_id: LecturerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionCode>> {
        let since = now - self.window.validity();
        Ok(self.store.list_sessions_since(lecturer_id, since).await?)
    }
}

fn rate_limited(retry_after: DateTime<Utc>) -> AttendanceError {
    AttendanceError::RateLimited {
        retry_after: retry_after.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::{AttendanceStore, MemoryStore};
    use crate::types::{Course, Lecturer};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
    }

    fn here() -> Coordinates {
        Coordinates {
            latitude: 6.52,
            longitude: 3.38,
        }
    }

    async fn setup(attendance: &AttendanceConfig) -> (Arc<MemoryStore>, QrSessionRegistry) {
        let store = Arc::new(MemoryStore::new());
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
                created_at: at(8, 0),
            })
            .await
            .unwrap();
        store.assign_lecturer(7, "CSC301").await.unwrap();

        let registry = QrSessionRegistry::new(
            store.clone(),
            attendance,
            &QrConfig {
                base_url: "https://attend.example.edu/".into(),
            },
        );
        (store, registry)
    }

    #[test]
    fn test_clock_hour_window_in_utc() {
        let (start, end) = rate_window(RateLimitPolicy::ClockHour, chrono_tz::UTC, at(10, 47));
        assert_eq!(start, at(10, 0));
        assert_eq!(end, at(11, 0));
    }

    #[test]
    fn test_clock_hour_window_respects_half_hour_offset() {
        // Asia/Kolkata is UTC+05:30, so local hours start at :30 UTC
        let (start, _) = rate_window(RateLimitPolicy::ClockHour, chrono_tz::Asia::Kolkata, at(10, 47));
        assert_eq!(start, at(10, 30));
        let (start, _) = rate_window(RateLimitPolicy::ClockHour, chrono_tz::Asia::Kolkata, at(10, 10));
        assert_eq!(start, at(9, 30));
    }

    #[test]
    fn test_rolling_window_buckets() {
        let policy = RateLimitPolicy::Rolling { minutes: 15 };
        let (start, end) = rate_window(policy, chrono_tz::UTC, at(10, 47));
        assert_eq!(start, at(10, 45));
        assert_eq!(end, at(11, 0));
    }

    #[tokio::test]
    async fn test_generate_builds_scan_url() {
        let (_, registry) = setup(&AttendanceConfig::default()).await;
        let code = registry.generate("CSC301", 7, here(), at(10, 5)).await.unwrap();

        assert_eq!(code.rate_window_start, at(10, 0));
        assert_eq!(
            code.url,
            "https://attend.example.edu/?course_code=CSC301&lecturer_id=7&latitude=6.52&longitude=3.38&generated_at=2025-03-03T10:05:00Z"
        );
    }

    #[tokio::test]
    async fn test_second_generation_in_same_hour_is_rate_limited() {
        let (store, registry) = setup(&AttendanceConfig::default()).await;
        registry.generate("CSC301", 7, here(), at(10, 5)).await.unwrap();

        let err = registry
            .generate("CSC301", 7, here(), at(10, 55))
            .await
            .unwrap_err();
        match err {
            AttendanceError::RateLimited { retry_after } => {
                assert_eq!(retry_after, "2025-03-03T11:00:00Z");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.count_sessions("CSC301").await.unwrap(), 1);

        // next clock hour is a new window
        let next = registry.generate("CSC301", 7, here(), at(11, 0)).await.unwrap();
        assert_eq!(registry.latest("CSC301", 7).await.unwrap().id, next.id);
    }

    #[tokio::test]
    async fn test_rolling_policy_uses_elapsed_time() {
        let config = AttendanceConfig {
            rate_limit: RateLimitPolicy::Rolling { minutes: 30 },
            ..AttendanceConfig::default()
        };
        let (_, registry) = setup(&config).await;
        registry.generate("CSC301", 7, here(), at(10, 20)).await.unwrap();

        // 10:35 is a new bucket but only 15 minutes have passed
        let err = registry
            .generate("CSC301", 7, here(), at(10, 35))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::RateLimited { .. }));

        assert!(registry.generate("CSC301", 7, here(), at(10, 50)).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_generation_yields_one_code() {
        let (store, registry) = setup(&AttendanceConfig::default()).await;
        let (a, b) = tokio::join!(
            registry.generate("CSC301", 7, here(), at(10, 5)),
            registry.generate("CSC301", 7, here(), at(10, 6)),
        );
        assert!(a.is_ok() ^ b.is_ok());
        assert_eq!(store.count_sessions("CSC301").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_generate_requires_course_and_association() {
        let (_, registry) = setup(&AttendanceConfig::default()).await;
        assert!(matches!(
            registry.generate("MTH101", 7, here(), at(10, 5)).await,
            Err(AttendanceError::CourseNotFound(_))
        ));
        assert!(matches!(
            registry.generate("CSC301", 8, here(), at(10, 5)).await,
            Err(AttendanceError::NotCourseLecturer)
        ));
    }

    #[tokio::test]
    async fn test_latest_and_recent() {
        let (_, registry) = setup(&AttendanceConfig::default()).await;
        assert!(matches!(
            registry.latest("CSC301", 7).await,
            Err(AttendanceError::SessionNotFound { .. })
        ));
        assert!(registry.latest_for_course("CSC301").await.is_err());

        let first = registry.generate("CSC301", 7, here(), at(9, 10)).await.unwrap();
        let second = registry.generate("CSC301", 7, here(), at(10, 5)).await.unwrap();

        assert_eq!(registry.latest("CSC301", 7).await.unwrap().id, second.id);
        assert_eq!(registry.latest_for_course("CSC301").await.unwrap().id, second.id);

        let recent = registry.recent_for_issuer(7, at(10, 15)).await.unwrap();
        assert_eq!(recent.len(), 1, "09:10 code is past its 60 minute validity");
        assert_eq!(recent[0].id, second.id);

        let recent = registry.recent_for_issuer(7, at(10, 5)).await.unwrap();
        assert_eq!(recent.iter().map(|c| c.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    }
}
