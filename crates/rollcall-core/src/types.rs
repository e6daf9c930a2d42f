//! Shared domain types and OpenAPI schemas.
//!
//! Records are plain data: they carry no behaviour beyond small helpers.
//! The validation logic that produces them lives in [`crate::validator`],
//! [`crate::registry`] and [`crate::reconciler`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AttendanceError, Result};

/// Identifier of a lecturer, as issued by the credential service.
pub type LecturerId = i64;

/// A student, keyed by matric number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    /// Matric number (primary key).
    #[schema(example = "CSC/2021/001")]
    pub matric_number: String,

    /// Full name.
    #[schema(example = "Ada Obi")]
    pub full_name: String,

    /// Contact email.
    #[schema(example = "ada.obi@example.edu")]
    pub email: String,
}

/// A lecturer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Lecturer {
    /// Lecturer id (primary key).
    #[schema(example = 7)]
    pub id: LecturerId,

    /// Display name.
    #[schema(example = "Dr. Bello")]
    pub name: String,

    /// Contact email.
    #[schema(example = "bello@example.edu")]
    pub email: String,

    /// Department.
    #[schema(example = "Computer Science")]
    pub department: String,
}

/// A course, keyed by course code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Course {
    /// Course code (primary key).
    #[schema(example = "CSC301")]
    pub course_code: String,

    /// Course title.
    #[schema(example = "Data Structures")]
    pub course_name: String,

    /// Credit units.
    #[schema(example = 3)]
    pub course_credits: i32,

    /// Semester label.
    #[schema(example = "First")]
    pub semester: String,

    /// When the course was first created.
    pub created_at: DateTime<Utc>,
}

/// Enrollment of a student in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    /// Student matric number.
    pub matric_number: String,

    /// Course code.
    pub course_code: String,
}

/// A decimal-degree coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    /// Latitude in degrees, -90..=90.
    #[schema(example = 6.5244)]
    pub latitude: f64,

    /// Longitude in degrees, -180..=180.
    #[schema(example = 3.3792)]
    pub longitude: f64,
}

impl Coordinates {
    /// Build a coordinate pair, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::InvalidCoordinates`] when either component
    /// is NaN, infinite, or outside the valid degree range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        if lat_ok && lon_ok {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(AttendanceError::InvalidCoordinates {
                latitude,
                longitude,
            })
        }
    }
}

impl fmt::Display for Coordinates {
    /// Formats as `"lat,lon"`, the stored geolocation form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A lecturer-issued, time- and location-bound attendance code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "course_code": "CSC301",
    "lecturer_id": 7,
    "generated_at": "2025-03-03T10:05:00Z",
    "latitude": 6.5244,
    "longitude": 3.3792,
    "rate_window_start": "2025-03-03T10:00:00Z",
    "url": "https://attend.example.edu/?course_code=CSC301&lecturer_id=7&latitude=6.5244&longitude=3.3792&generated_at=2025-03-03T10:05:00Z"
}))]
pub struct SessionCode {
    /// Store-assigned id.
    pub id: i64,

    /// Course this code belongs to.
    pub course_code: String,

    /// Lecturer who generated the code.
    pub lecturer_id: LecturerId,

    /// Generation time (UTC). Also the start of the attendance window.
    pub generated_at: DateTime<Utc>,

    /// Latitude where the code was generated.
    pub latitude: f64,

    /// Longitude where the code was generated.
    pub longitude: f64,

    /// Start of the rate-limit window this code occupies.
    pub rate_window_start: DateTime<Utc>,

    /// Scan URL encoded into the QR image.
    pub url: String,
}

impl SessionCode {
    /// Location where the code was generated.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// A session code that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionCode {
    /// Course code.
    pub course_code: String,
    /// Issuing lecturer.
    pub lecturer_id: LecturerId,
    /// Generation time.
    pub generated_at: DateTime<Utc>,
    /// Generation location.
    pub coordinates: Coordinates,
    /// Rate-limit window key.
    pub rate_window_start: DateTime<Utc>,
    /// Scan URL.
    pub url: String,
}

/// Attendance status of a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum AttendanceStatus {
    /// The student scanned a live code in range.
    Present,
    /// The student did not scan before the window closed.
    Absent,
}

impl AttendanceStatus {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Present" => Ok(Self::Present),
            "Absent" => Ok(Self::Absent),
            other => Err(format!("unknown attendance status '{other}'")),
        }
    }
}

/// A persisted attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    /// Store-assigned id.
    pub id: i64,
    /// Student matric number.
    pub matric_number: String,
    /// Course code.
    pub course_code: String,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
    /// Present or Absent.
    pub status: AttendanceStatus,
    /// `"lat,lon"` for Present records, `None` for Absent ones.
    pub geo_location: Option<String>,
    /// Generation time of the session code this record belongs to.
    pub window_start: DateTime<Utc>,
}

/// An attendance record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendanceRecord {
    /// Student matric number.
    pub matric_number: String,
    /// Course code.
    pub course_code: String,
    /// Record timestamp.
    pub recorded_at: DateTime<Utc>,
    /// Present or Absent.
    pub status: AttendanceStatus,
    /// `"lat,lon"` or `None`.
    pub geo_location: Option<String>,
    /// Session window key.
    pub window_start: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_accepts_valid_range() {
        assert!(Coordinates::new(90.0, -180.0).is_ok());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
        assert!(Coordinates::new(6.5244, 3.3792).is_ok());
    }

    #[test]
    fn test_coordinates_rejects_out_of_range_and_nan() {
        assert!(matches!(
            Coordinates::new(91.0, 0.0),
            Err(AttendanceError::InvalidCoordinates { .. })
        ));
        assert!(Coordinates::new(0.0, 180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_coordinates_display_matches_stored_form() {
        let c = Coordinates::new(6.5, 3.25).unwrap();
        assert_eq!(c.to_string(), "6.5,3.25");
    }

    #[test]
    fn test_status_round_trips_through_str() {
        assert_eq!("Present".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::Absent.to_string(), "Absent");
        assert!("Late".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn test_status_sorts_present_first() {
        let mut statuses = vec![AttendanceStatus::Absent, AttendanceStatus::Present];
        statuses.sort();
        assert_eq!(statuses, vec![AttendanceStatus::Present, AttendanceStatus::Absent]);
    }
}
