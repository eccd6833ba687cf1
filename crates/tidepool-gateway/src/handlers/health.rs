//! Process health endpoint.
//!
//! `GET /health` answers as long as the gateway is serving. Whether the tank
//! controller is reachable is `GET /api/system/status`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use tidepool_control::ControlPlane;
use tidepool_core::DeviceId;

use crate::auth::Authorizer;
use crate::state::GatewayState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Gateway build version.
    pub version: &'static str,
    /// Controller this gateway queues commands for.
    pub device_id: DeviceId,
    /// Whether operator writes need a bearer token.
    pub operator_auth: bool,
}

/// Liveness probe for the gateway process.
pub async fn health<C, A>(State(state): State<Arc<GatewayState<C, A>>>) -> Json<HealthResponse>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        device_id: *state.device_id(),
        operator_auth: state.authorizer.is_enforcing(),
    })
}
