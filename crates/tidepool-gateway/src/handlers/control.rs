//! Actuator control endpoints.
//!
//! Operator writes update the Device State and queue a command; the device
//! drains the queue through `GET /control/latest`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tidepool_control::{
    Command, CommandValue, ControlPlane, FeedingSettings, MAX_BRIGHTNESS,
};

use crate::auth::{AdminAccess, Authorizer};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to switch the pump.
#[derive(Debug, Deserialize)]
pub struct PumpBody {
    /// Desired pump state.
    pub state: bool,
}

/// Request to set the light brightness.
#[derive(Debug, Deserialize)]
pub struct BrightnessBody {
    /// Brightness percentage.
    pub value: i64,
}

/// A command as stored in the queue.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// Command ID.
    pub id: String,
    /// Instruction, serialized as `{"type": ..., "value": ...}`.
    #[serde(flatten)]
    pub value: CommandValue,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether the command was already delivered or superseded.
    pub processed: bool,
}

impl From<Command> for CommandResponse {
    fn from(command: Command) -> Self {
        Self {
            id: command.id.to_string(),
            value: command.value,
            created_at: command.created_at,
            processed: command.processed,
        }
    }
}

/// Response for pump and brightness writes.
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    /// Always `"queued"`.
    pub status: &'static str,
    /// The queued command, `null` if queueing failed.
    pub command: Option<CommandResponse>,
}

/// Response for a manual feed.
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    /// Always `"queued"`.
    pub status: &'static str,
    /// Newly scheduled feeding.
    pub next_feeding_at: DateTime<Utc>,
}

/// Response for feeding settings and feed confirmation.
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    /// Always `true`.
    pub success: bool,
    /// Newly scheduled feeding, omitted when unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_feeding_at: Option<DateTime<Utc>>,
}

/// Response for a device poll.
#[derive(Debug, Serialize)]
pub struct PollResponse {
    /// Whether a command is delivered.
    pub has_command: bool,
    /// The delivered instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandValue>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Switch the pump on or off.
///
/// # Errors
///
/// Returns an error if the caller is not authorized or the Device State
/// cannot be updated.
pub async fn set_pump<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
    _admin: AdminAccess,
    ApiJson(body): ApiJson<PumpBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let dispatch = state.control.set_pump(state.device_id(), body.state).await?;

    Ok(Json(QueuedResponse {
        status: "queued",
        command: dispatch.queued.map(CommandResponse::from),
    }))
}

/// Set the light brightness.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` if the value is outside 0–100.
pub async fn set_brightness<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
    _admin: AdminAccess,
    ApiJson(body): ApiJson<BrightnessBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let value = u8::try_from(body.value)
        .ok()
        .filter(|v| *v <= MAX_BRIGHTNESS)
        .ok_or_else(|| {
            ApiError::BadRequest(format!("brightness must be between 0 and {MAX_BRIGHTNESS}"))
        })?;

    let dispatch = state.control.set_brightness(state.device_id(), value).await?;

    Ok(Json(QueuedResponse {
        status: "queued",
        command: dispatch.queued.map(CommandResponse::from),
    }))
}

/// Dispense food now.
///
/// # Errors
///
/// Returns an error if the caller is not authorized or the Device State
/// cannot be updated.
pub async fn feed<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
    _admin: AdminAccess,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let dispatch = state.control.feed_now(state.device_id()).await?;

    Ok(Json(FeedResponse {
        status: "queued",
        next_feeding_at: dispatch.next_feeding_at,
    }))
}

/// Change the feeding interval and/or quantity.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` if no setting is provided.
pub async fn update_feeding_settings<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
    _admin: AdminAccess,
    ApiJson(body): ApiJson<FeedingSettings>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let update = state
        .control
        .update_feeding_settings(state.device_id(), body)
        .await?;

    Ok(Json(ScheduleResponse {
        success: true,
        next_feeding_at: update.next_feeding_at,
    }))
}

/// Device reports that it fed on its own schedule.
///
/// # Errors
///
/// Returns an error if the Device State cannot be updated.
pub async fn confirm_feed<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let next = state.control.confirm_feed(state.device_id()).await?;

    Ok(Json(ScheduleResponse {
        success: true,
        next_feeding_at: Some(next),
    }))
}

/// Device poll: record the heartbeat and deliver at most one command.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub async fn latest_command<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let command = state.control.poll_command(state.device_id()).await?;

    Ok(Json(PollResponse {
        has_command: command.is_some(),
        command: command.map(|c| c.value),
    }))
}
