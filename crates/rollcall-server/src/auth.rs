//! Bearer token authentication.
//!
//! Tokens are issued by the institution's credential service and signed with
//! a shared HS256 secret. The server only verifies them: `sub` names the
//! caller (a matric number for students, a numeric id for lecturers) and
//! `role` decides which endpoints they may use.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::RequestPartsExt;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rollcall_core::LecturerId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::ApiError;
use crate::state::SharedState;

/// Caller role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A student; `sub` is the matric number.
    Student,
    /// A lecturer; `sub` is the lecturer id.
    Lecturer,
}

/// Verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller identity.
    pub sub: String,
    /// Caller role.
    pub role: Role,
    /// Expiry as seconds since the epoch.
    pub exp: u64,
}

/// Verify `token` and return its claims.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] if the signature, algorithm or expiry
/// check fails.
pub fn decode_claims(token: &str, key: &DecodingKey) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            ApiError::unauthorized("Invalid or expired token.")
        })
}

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::unauthorized("Missing bearer token."))?;

        decode_claims(bearer.token(), state.decoding_key()).map(Self)
    }
}

/// An authenticated student.
#[derive(Debug, Clone)]
pub struct StudentUser {
    /// Matric number from `sub`.
    pub matric_number: String,
}

impl FromRequestParts<SharedState> for StudentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Student {
            return Err(ApiError::wrong_role("student"));
        }
        Ok(Self {
            matric_number: claims.sub,
        })
    }
}

/// An authenticated lecturer.
#[derive(Debug, Clone)]
pub struct LecturerUser {
    /// Lecturer id parsed from `sub`.
    pub lecturer_id: LecturerId,
}

impl FromRequestParts<SharedState> for LecturerUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Lecturer {
            return Err(ApiError::wrong_role("lecturer"));
        }
        let lecturer_id = claims
            .sub
            .parse()
            .map_err(|_| ApiError::unauthorized("Lecturer token subject is not an id."))?;
        Ok(Self { lecturer_id })
    }
}
