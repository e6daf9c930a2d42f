//! Absence reconciliation.
//!
//! When a session window closes, every enrolled student without a Present
//! record for that window gets an Absent one. Inserts go through the
//! (student, course, window start) uniqueness key, and a conflict means the
//! student is already marked, so reconciling the same window twice is a
//! no-op the second time.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};
use crate::store::SharedStore;
use crate::types::{AttendanceStatus, NewAttendanceRecord};
use crate::window::SessionWindow;

/// Materializes Absent records for a closed session window.
#[derive(Clone)]
pub struct AbsenceReconciler {
    store: SharedStore,
    window: SessionWindow,
}

impl std::fmt::Debug for AbsenceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbsenceReconciler")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl AbsenceReconciler {
    /// Create a reconciler over `store`.
    #[must_use]
    pub const fn new(store: SharedStore, window: SessionWindow) -> Self {
        Self { store, window }
    }

    /// Mark absent every enrolled student with no Present record in the
    /// window that opened at `generated_at`. Returns the number of Absent
    /// records created by this call. A window still live at `now` is left
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::Store`](crate::error::AttendanceError::Store)
    /// for any backend failure other than a uniqueness conflict.
    #[instrument(skip(self), fields(course = %course_code))]
    pub async fn reconcile(
        &self,
        course_code: &str,
        generated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if self.window.is_live(generated_at, now) {
            debug!(%generated_at, "Window still open");
            return Ok(0);
        }

        if self.store.count_enrolled(course_code).await? == 0 {
            debug!("No students enrolled");
            return Ok(0);
        }

        let enrolled = self.store.list_enrolled(course_code).await?;
        let present = self.store.list_present(course_code, generated_at).await?;

        let mut created = 0;
        for matric_number in enrolled.into_iter().filter(|m| !present.contains(m)) {
            let record = NewAttendanceRecord {
                matric_number,
                course_code: course_code.to_string(),
                recorded_at: now,
                status: AttendanceStatus::Absent,
                geo_location: None,
                window_start: generated_at,
            };
            match self.store.insert_attendance(record).await {
                Ok(_) => created += 1,
                Err(StoreError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(created, "Reconciled absences");
        Ok(created)
    }
}
