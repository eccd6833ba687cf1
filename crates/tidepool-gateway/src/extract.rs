//! Request extractors.

use axum::extract::FromRequest;

use crate::error::ApiError;

/// JSON request body whose rejections use the API error format.
///
/// A missing or mistyped field becomes `400 bad_request` instead of axum's
/// plain-text `422`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
