//! Telemetry endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tidepool_control::{
    ControlPlane, DashboardSnapshot, HistoryRange, SensorReading, TelemetryUpload,
};

use crate::auth::Authorizer;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Response for a telemetry upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Always `true`.
    pub success: bool,
}

/// Feeding section of the dashboard.
#[derive(Debug, Serialize)]
pub struct FeedingView {
    /// Next scheduled feeding.
    pub next_feeding: Option<DateTime<Utc>>,
    /// Interval specification.
    pub interval: String,
    /// Portions per feeding.
    pub quantity: u32,
    /// Last feeding.
    pub last_fed: Option<DateTime<Utc>>,
}

/// Dashboard snapshot.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// Latest water temperature in °C.
    pub temperature: f64,
    /// Latest water level percentage.
    pub water_level: Option<f64>,
    /// When the latest reading was ingested.
    pub last_updated: DateTime<Utc>,
    /// Current light brightness.
    pub brightness: Option<u8>,
    /// `"ON"` or `"OFF"`.
    pub pump_status: Option<&'static str>,
    /// Feeding schedule.
    pub feeding: Option<FeedingView>,
    /// When the pump was last switched.
    pub last_pump_toggle: Option<DateTime<Utc>>,
}

impl From<DashboardSnapshot> for DashboardResponse {
    fn from(snapshot: DashboardSnapshot) -> Self {
        let DashboardSnapshot {
            reading,
            device,
            last_pump_toggle,
        } = snapshot;

        Self {
            temperature: reading.temperature,
            water_level: reading.water_level,
            last_updated: reading.created_at,
            brightness: device.as_ref().map(|d| d.brightness),
            pump_status: device
                .as_ref()
                .map(|d| if d.pump_active { "ON" } else { "OFF" }),
            feeding: device.map(|d| FeedingView {
                next_feeding: d.next_feeding_at,
                interval: d.feeding_interval,
                quantity: d.feeding_quantity,
                last_fed: d.last_fed_at,
            }),
            last_pump_toggle,
        }
    }
}

/// Query parameters for history retrieval.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// `24h`, `7d` or `30d`; anything else means `24h`.
    #[serde(default)]
    pub range: Option<String>,
}

/// A single historical reading.
#[derive(Debug, Serialize)]
pub struct ReadingView {
    /// Water temperature in °C.
    pub temperature: f64,
    /// Water level percentage.
    pub water_level: Option<f64>,
    /// Ingestion timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<SensorReading> for ReadingView {
    fn from(reading: SensorReading) -> Self {
        Self {
            temperature: reading.temperature,
            water_level: reading.water_level,
            created_at: reading.created_at,
        }
    }
}

/// Response for history retrieval.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Readings, oldest first.
    pub data: Vec<ReadingView>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Ingest a telemetry sample from the device.
///
/// Pump automation runs as a side effect and never fails the upload.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` for non-finite values, or an internal
/// error if the reading cannot be stored.
pub async fn upload<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
    ApiJson(body): ApiJson<TelemetryUpload>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    state.control.ingest_reading(state.device_id(), body).await?;

    Ok(Json(UploadResponse { success: true }))
}

/// Latest reading with the current device state.
///
/// # Errors
///
/// Returns `ApiError::NotFound` if no reading exists yet.
pub async fn latest<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let snapshot = state.control.dashboard(state.device_id()).await?;

    Ok(Json(DashboardResponse::from(snapshot)))
}

/// Readings within the requested window.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn history<C, A>(
    State(state): State<Arc<GatewayState<C, A>>>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    let range = HistoryRange::parse_or_default(query.range.as_deref());
    let readings = state
        .control
        .sensor_history(state.device_id(), range)
        .await?;

    Ok(Json(HistoryResponse {
        data: readings.into_iter().map(ReadingView::from).collect(),
    }))
}
