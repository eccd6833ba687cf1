//! Operator authorization.
//!
//! Operator writes (pump, brightness, feed, feeding settings) pass through an
//! [`Authorizer`]. Device endpoints stay open because the firmware has no
//! credentials.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use thiserror::Error;

use tidepool_control::ControlPlane;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Authorization failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token was presented.
    #[error("missing bearer token")]
    MissingToken,

    /// The presented token does not match.
    #[error("invalid token")]
    InvalidToken,
}

/// Decides whether a request may perform operator writes.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Check the bearer token of a request, if it carried one.
    ///
    /// # Errors
    ///
    /// Returns an `AuthError` if the request is not allowed.
    async fn authorize(&self, bearer: Option<&str>) -> Result<(), AuthError>;

    /// Whether requests without valid credentials are turned away.
    fn is_enforcing(&self) -> bool {
        true
    }
}

/// Shared-secret authorizer.
///
/// Only a blake3 digest of the secret is kept, and comparison goes through
/// `blake3::Hash` equality which is constant time.
#[derive(Clone)]
pub struct TokenAuthorizer {
    expected: Option<blake3::Hash>,
}

impl TokenAuthorizer {
    /// Accept every request.
    #[must_use]
    pub const fn open() -> Self {
        Self { expected: None }
    }

    /// Require `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        Self {
            expected: Some(blake3::hash(token.as_bytes())),
        }
    }

    /// Build from an optional configured token.
    #[must_use]
    pub fn from_config(token: Option<&str>) -> Self {
        token.map_or_else(Self::open, Self::with_token)
    }
}

#[async_trait]
impl Authorizer for TokenAuthorizer {
    async fn authorize(&self, bearer: Option<&str>) -> Result<(), AuthError> {
        let Some(expected) = self.expected else {
            return Ok(());
        };
        let token = bearer.ok_or(AuthError::MissingToken)?;
        if blake3::hash(token.as_bytes()) == expected {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    fn is_enforcing(&self) -> bool {
        self.expected.is_some()
    }
}

/// Proof that the request was authorized for operator writes.
///
/// Add this extractor to a handler to guard it.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[async_trait]
impl<C, A> FromRequestParts<Arc<GatewayState<C, A>>> for AdminAccess
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C, A>>,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        state.authorizer.authorize(bearer).await?;
        Ok(Self)
    }
}
