//! Shared fixtures for HTTP tests.

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rollcall_core::types::NewSessionCode;
use rollcall_core::{
    AttendanceStore, Config, Coordinates, Course, Enrollment, Lecturer, LecturerId, MemoryStore,
    SessionCode, Student,
};

use crate::api::create_router;
use crate::auth::{Claims, Role};
use crate::state::{AppState, SharedState, MEMORY_DATABASE};

pub const SECRET: &str = "test-secret";
pub const MATRIC: &str = "CSC/2021/001";
pub const COURSE: &str = "CSC301";
pub const LECTURER: LecturerId = 7;

/// Lecture hall location.
pub const HALL: Coordinates = Coordinates {
    latitude: 6.5244,
    longitude: 3.3792,
};

pub fn state() -> SharedState {
    let mut config = Config::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.database.url = MEMORY_DATABASE.to_string();
    config.server.cors_origin = None;
    Arc::new(AppState::new(config, Arc::new(MemoryStore::new())))
}

pub fn server(state: SharedState) -> TestServer {
    TestServer::new(create_router(state)).unwrap()
}

pub fn token(sub: &str, role: Role) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role,
        exp: u64::try_from(Utc::now().timestamp()).unwrap() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn student_token() -> String {
    token(MATRIC, Role::Student)
}

pub fn lecturer_token() -> String {
    token(&LECTURER.to_string(), Role::Lecturer)
}

/// One lecturer teaching [`COURSE`] with [`MATRIC`] enrolled.
pub async fn seed(state: &SharedState) {
    let store = &state.store;
    store
        .insert_student(Student {
            matric_number: MATRIC.into(),
            full_name: "Ada Obi".into(),
            email: "ada@example.edu".into(),
        })
        .await
        .unwrap();
    store
        .insert_lecturer(Lecturer {
            id: LECTURER,
            name: "Dr. Bello".into(),
            email: "bello@example.edu".into(),
            department: "Computer Science".into(),
        })
        .await
        .unwrap();
    store
        .insert_course(Course {
            course_code: COURSE.into(),
            course_name: "Data Structures".into(),
            course_credits: 3,
            semester: "First".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    store.assign_lecturer(LECTURER, COURSE).await.unwrap();
    store
        .insert_enrollment(Enrollment {
            matric_number: MATRIC.into(),
            course_code: COURSE.into(),
        })
        .await
        .unwrap();
}

/// Insert a session code directly, bypassing the rate limit.
pub async fn session_at(state: &SharedState, generated_at: DateTime<Utc>) -> SessionCode {
    state
        .store
        .insert_session(NewSessionCode {
            course_code: COURSE.into(),
            lecturer_id: LECTURER,
            generated_at,
            coordinates: HALL,
            rate_window_start: generated_at,
            url: String::new(),
        })
        .await
        .unwrap()
}
