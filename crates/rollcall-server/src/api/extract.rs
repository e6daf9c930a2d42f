//! Extractors whose rejections render as [`ApiError`] bodies.

use axum::extract::FromRequest;

use super::error::ApiError;

/// JSON body extractor; malformed bodies become `400 INVALID_BODY`.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
