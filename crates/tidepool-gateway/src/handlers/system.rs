//! Device status endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use tidepool_control::ControlPlane;

use crate::auth::Authorizer;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Response for the device status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether the controller polled within the liveness window.
    pub esp32_online: bool,
    /// Last poll.
    pub last_seen: Option<DateTime<Utc>>,
}

/// Report whether the device is online.
///
/// # Errors
///
/// Returns `ApiError::NotFound` if the device was never provisioned.
pub async fn status<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let liveness = state.control.device_status(state.device_id()).await?;

    Ok(Json(StatusResponse {
        esp32_online: liveness.online,
        last_seen: liveness.last_seen,
    }))
}
