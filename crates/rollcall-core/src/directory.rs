//! Students, lecturers, courses and enrollments.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::error::{AttendanceError, Result, StoreError};
use crate::store::SharedStore;
use crate::types::{Course, Enrollment, Lecturer, LecturerId, Student};

static MATRIC_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9/_-]{0,31}$").expect("static pattern"));

static COURSE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2,6}[0-9]{3,4}[A-Z]?$").expect("static pattern"));

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static pattern"));

/// Validate a matric number.
///
/// # Errors
///
/// Returns [`AttendanceError::InvalidIdentifier`] if the format is wrong.
pub fn validate_matric_number(matric_number: &str) -> Result<()> {
    if MATRIC_NUMBER.is_match(matric_number) {
        Ok(())
    } else {
        Err(AttendanceError::InvalidIdentifier(format!(
            "matric number '{matric_number}'"
        )))
    }
}

/// Canonical form of a course code: trimmed, inner spaces removed, upper case.
///
/// # Errors
///
/// Returns [`AttendanceError::InvalidIdentifier`] if the result is not a
/// course code such as `CSC301`.
pub fn normalize_course_code(raw: &str) -> Result<String> {
    let code: String = raw
        .split_whitespace()
        .collect::<String>()
        .to_ascii_uppercase();
    if COURSE_CODE.is_match(&code) {
        Ok(code)
    } else {
        Err(AttendanceError::InvalidIdentifier(format!("course code '{raw}'")))
    }
}

fn validate_email(email: &str) -> Result<()> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(AttendanceError::InvalidIdentifier(format!("email '{email}'")))
    }
}

/// Course details supplied by a lecturer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "course_code": "CSC301",
    "course_name": "Data Structures",
    "course_credits": 3,
    "semester": "First"
}))]
pub struct NewCourse {
    /// Course code, normalized on creation.
    pub course_code: String,
    /// Course title.
    pub course_name: String,
    /// Credit units.
    pub course_credits: i32,
    /// Semester label.
    pub semester: String,
}

/// A course as listed for the caller. Lecturers also see how many students
/// are enrolled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CourseListing {
    /// Course code.
    #[schema(example = "CSC301")]
    pub course_code: String,
    /// Course title.
    pub course_name: String,
    /// Credit units.
    pub course_credits: i32,
    /// Semester label.
    pub semester: String,
    /// Enrolled students; only present in a lecturer's listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled_students: Option<u64>,
}

impl CourseListing {
    fn new(course: Course, enrolled_students: Option<u64>) -> Self {
        Self {
            course_code: course.course_code,
            course_name: course.course_name,
            course_credits: course.course_credits,
            semester: course.semester,
            enrolled_students,
        }
    }
}

/// Registration and enrollment operations.
#[derive(Clone)]
pub struct Directory {
    store: SharedStore,
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory").finish_non_exhaustive()
    }
}

impl Directory {
    /// Create a directory over `store`.
    #[must_use]
    pub const fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Register a student profile.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::InvalidIdentifier`] for a malformed matric number or email
    /// - [`AttendanceError::StudentAlreadyExists`] if the matric number is taken
    #[instrument(skip(self, student), fields(student = %student.matric_number))]
    pub async fn register_student(&self, student: Student) -> Result<Student> {
        validate_matric_number(&student.matric_number)?;
        validate_email(&student.email)?;

        match self.store.insert_student(student).await {
            Ok(s) => {
                info!("Registered student");
                Ok(s)
            }
            Err(StoreError::Conflict(_)) => Err(AttendanceError::StudentAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Register a lecturer profile.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::InvalidIdentifier`] for a malformed email
    /// - [`AttendanceError::LecturerAlreadyExists`] if the id is taken
    #[instrument(skip(self, lecturer), fields(lecturer = lecturer.id))]
    pub async fn register_lecturer(&self, lecturer: Lecturer) -> Result<Lecturer> {
        validate_email(&lecturer.email)?;

        match self.store.insert_lecturer(lecturer).await {
            Ok(l) => {
                info!("Registered lecturer");
                Ok(l)
            }
            Err(StoreError::Conflict(_)) => Err(AttendanceError::LecturerAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a course, or join it if it already exists, and associate the
    /// lecturer with it.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::LecturerNotFound`] if the lecturer has no profile
    /// - [`AttendanceError::InvalidIdentifier`] for a malformed course code
    /// - [`AttendanceError::LecturerAlreadyAssigned`] if already associated
    #[instrument(skip(self, course), fields(course = %course.course_code))]
    pub async fn create_course(
        &self,
        lecturer_id: LecturerId,
        course: NewCourse,
        now: DateTime<Utc>,
    ) -> Result<Course> {
        if self.store.find_lecturer(lecturer_id).await?.is_none() {
            return Err(AttendanceError::LecturerNotFound(lecturer_id));
        }
        let course_code = normalize_course_code(&course.course_code)?;

        let existing = self.store.find_course(&course_code).await?;
        let stored = match existing {
            Some(c) => c,
            None => {
                let new = Course {
                    course_code: course_code.clone(),
                    course_name: course.course_name,
                    course_credits: course.course_credits,
                    semester: course.semester,
                    created_at: now,
                };
                match self.store.insert_course(new).await {
                    Ok(c) => c,
                    // created concurrently by another lecturer
                    Err(StoreError::Conflict(_)) => self
                        .store
                        .find_course(&course_code)
                        .await?
                        .ok_or_else(|| AttendanceError::CourseNotFound(course_code.clone()))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        match self.store.assign_lecturer(lecturer_id, &course_code).await {
            Ok(()) => {
                info!(lecturer = lecturer_id, "Lecturer associated with course");
                Ok(stored)
            }
            Err(StoreError::Conflict(_)) => Err(AttendanceError::LecturerAlreadyAssigned),
            Err(e) => Err(e.into()),
        }
    }

    /// Enroll a student in a course.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::StudentNotFound`] / [`AttendanceError::CourseNotFound`]
    /// - [`AttendanceError::AlreadyEnrolled`] if already enrolled
    #[instrument(skip(self))]
    pub async fn enroll(&self, matric_number: &str, course_code: &str) -> Result<Enrollment> {
        if self.store.find_student(matric_number).await?.is_none() {
            return Err(AttendanceError::StudentNotFound(matric_number.to_string()));
        }
        let course = self
            .store
            .find_course(course_code)
            .await?
            .ok_or_else(|| AttendanceError::CourseNotFound(course_code.to_string()))?;

        let enrollment = Enrollment {
            matric_number: matric_number.to_string(),
            course_code: course.course_code,
        };
        match self.store.insert_enrollment(enrollment).await {
            Ok(e) => {
                info!("Enrolled student");
                Ok(e)
            }
            Err(StoreError::Conflict(_)) => Err(AttendanceError::AlreadyEnrolled),
            Err(e) => Err(e.into()),
        }
    }

    /// Courses a student is enrolled in.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::Store`] if the lookup fails.
    pub async fn courses_for_student(&self, matric_number: &str) -> Result<Vec<CourseListing>> {
        let courses = self.store.list_courses_for_student(matric_number).await?;
        Ok(courses
            .into_iter()
            .map(|c| CourseListing::new(c, None))
            .collect())
    }

    /// Courses a lecturer teaches, each with its enrollment count.
    ///
    /// # Errors
    ///
    /// Returns [`AttendanceError::Store`] if a lookup fails.
    pub async fn courses_for_lecturer(
        &self,
        lecturer_id: LecturerId,
    ) -> Result<Vec<CourseListing>> {
        let courses = self.store.list_courses_for_lecturer(lecturer_id).await?;
        let mut listings = Vec::with_capacity(courses.len());
        for course in courses {
            let enrolled = self.store.count_enrolled(&course.course_code).await?;
            listings.push(CourseListing::new(course, Some(enrolled)));
        }
        Ok(listings)
    }
}
