//! Control plane service implementation.
//!
//! This module provides the `ControlPlane` trait and `ControlPlaneService` implementation
//! that coordinates device state, the command queue, feeding and telemetry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidepool_core::DeviceId;
use tidepool_store::{
    Command, CommandKind, CommandValue, DeviceState, DeviceStatePatch, FeedTrigger,
    FeedingConfig, SensorReading, Store,
};

use crate::autopump;
use crate::error::{ControlError, Result};
use crate::feeding::{self, FeedingInterval, FeedingPolicy};
use crate::liveness;
use crate::queue;
use crate::types::{
    ControlConfig, DashboardSnapshot, DeviceLiveness, Dispatch, FeedDispatch, FeedingSettings,
    HistoryRange, SettingsUpdate, TelemetryUpload,
};

/// Highest accepted brightness.
pub const MAX_BRIGHTNESS: u8 = 100;

/// Trait defining the control plane operations.
///
/// Every operation is addressed by an explicit device; implementations hold no
/// per-device state between calls.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    // =========================================================================
    // Provisioning
    // =========================================================================

    /// Create the Device State row with defaults if it doesn't exist yet.
    ///
    /// Returns the existing row unchanged when the device is already known.
    async fn provision_device(&self, device_id: &DeviceId) -> Result<DeviceState>;

    // =========================================================================
    // Operator Writes
    // =========================================================================

    /// Switch the pump and queue a `PUMP` command.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DeviceNotFound` if the device isn't provisioned.
    async fn set_pump(&self, device_id: &DeviceId, on: bool) -> Result<Dispatch>;

    /// Set the light brightness (0–100) and queue a `LIGHT` command.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidInput` if `value` exceeds 100.
    async fn set_brightness(&self, device_id: &DeviceId, value: u8) -> Result<Dispatch>;

    /// Dispense food now, restart the feeding cycle and queue a `FEED` command.
    async fn feed_now(&self, device_id: &DeviceId) -> Result<FeedDispatch>;

    /// Change the feeding interval and/or quantity and queue a `CONFIG` command.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidInput` if no setting is provided.
    async fn update_feeding_settings(
        &self,
        device_id: &DeviceId,
        settings: FeedingSettings,
    ) -> Result<SettingsUpdate>;

    // =========================================================================
    // Device Operations
    // =========================================================================

    /// Record a feeding performed by the device on its own schedule.
    ///
    /// Returns the newly scheduled feeding.
    async fn confirm_feed(&self, device_id: &DeviceId) -> Result<DateTime<Utc>>;

    /// Record a heartbeat and hand out the next valid command, if any.
    async fn poll_command(&self, device_id: &DeviceId) -> Result<Option<Command>>;

    /// Store a telemetry sample and run pump automation on it.
    ///
    /// Automation failures are logged and never fail the ingestion.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidInput` for non-finite values.
    async fn ingest_reading(
        &self,
        device_id: &DeviceId,
        upload: TelemetryUpload,
    ) -> Result<SensorReading>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the device polled recently.
    async fn device_status(&self, device_id: &DeviceId) -> Result<DeviceLiveness>;

    /// Latest reading combined with the current device state.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NoReadings` if nothing was uploaded yet.
    async fn dashboard(&self, device_id: &DeviceId) -> Result<DashboardSnapshot>;

    /// Readings within `range`, oldest first.
    async fn sensor_history(
        &self,
        device_id: &DeviceId,
        range: HistoryRange,
    ) -> Result<Vec<SensorReading>>;
}

/// The main control plane service implementation.
pub struct ControlPlaneService<S: Store> {
    store: Arc<S>,
    config: ControlConfig,
}

impl<S: Store> ControlPlaneService<S> {
    /// Create a new control plane service.
    #[must_use]
    pub fn new(store: Arc<S>, config: ControlConfig) -> Self {
        Self { store, config }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ControlConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    fn read_state(&self, device_id: &DeviceId) -> Result<DeviceState> {
        self.store
            .get_device_state(device_id)?
            .ok_or(ControlError::DeviceNotFound(*device_id))
    }

    fn update_state(&self, device_id: &DeviceId, patch: &DeviceStatePatch) -> Result<DeviceState> {
        self.store
            .update_device_state(device_id, patch)
            .map_err(|e| ControlError::for_device(device_id, e))
    }

    /// Queue a command after the Device State was written.
    ///
    /// A failure here leaves state and queue out of sync until the next write
    /// of the same kind, so it is logged rather than returned.
    fn queue_after_update(
        &self,
        device_id: &DeviceId,
        value: CommandValue,
        now: DateTime<Utc>,
    ) -> Option<Command> {
        let kind = value.kind();
        match queue::submit(&*self.store, device_id, value, now) {
            Ok(command) => Some(command),
            Err(e) => {
                tracing::warn!(
                    device_id = %device_id,
                    kind = %kind,
                    error = %e,
                    "Device state updated but command was not queued"
                );
                None
            }
        }
    }

    /// Restart the feeding cycle from `now` and record the feeding.
    fn record_feeding(&self, device_id: &DeviceId, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let state = self.read_state(device_id)?;
        let interval = FeedingInterval::parse_or_default(Some(&state.feeding_interval));
        let next = feeding::next_feeding_at(interval, state.next_feeding_at, FeedingPolicy::Reset, now);

        let patch = DeviceStatePatch {
            last_fed_at: Some(now),
            next_feeding_at: Some(next),
            ..Default::default()
        };
        self.update_state(device_id, &patch)?;
        Ok(next)
    }
}

#[async_trait]
impl<S: Store + 'static> ControlPlane for ControlPlaneService<S> {
    // =========================================================================
    // Provisioning
    // =========================================================================

    async fn provision_device(&self, device_id: &DeviceId) -> Result<DeviceState> {
        if let Some(state) = self.store.get_device_state(device_id)? {
            return Ok(state);
        }

        let state = DeviceState::provisioned(*device_id, Utc::now());
        self.store.put_device_state(&state)?;

        tracing::info!(device_id = %device_id, "Provisioned device");

        Ok(state)
    }

    // =========================================================================
    // Operator Writes
    // =========================================================================

    async fn set_pump(&self, device_id: &DeviceId, on: bool) -> Result<Dispatch> {
        let now = Utc::now();
        let patch = DeviceStatePatch {
            pump_active: Some(on),
            ..Default::default()
        };
        self.update_state(device_id, &patch)?;

        tracing::info!(device_id = %device_id, on, "Pump switched");

        let value = CommandValue::Pump(on);
        let queued = self.queue_after_update(device_id, value.clone(), now);
        Ok(Dispatch { value, queued })
    }

    async fn set_brightness(&self, device_id: &DeviceId, value: u8) -> Result<Dispatch> {
        if value > MAX_BRIGHTNESS {
            return Err(ControlError::InvalidInput(format!(
                "brightness must be between 0 and {MAX_BRIGHTNESS}"
            )));
        }

        let now = Utc::now();
        let patch = DeviceStatePatch {
            brightness: Some(value),
            ..Default::default()
        };
        self.update_state(device_id, &patch)?;

        tracing::info!(device_id = %device_id, brightness = value, "Brightness set");

        let value = CommandValue::Light(value);
        let queued = self.queue_after_update(device_id, value.clone(), now);
        Ok(Dispatch { value, queued })
    }

    async fn feed_now(&self, device_id: &DeviceId) -> Result<FeedDispatch> {
        let now = Utc::now();
        let next_feeding_at = self.record_feeding(device_id, now)?;

        tracing::info!(device_id = %device_id, next_feeding_at = %next_feeding_at, "Manual feed");

        let queued = self.queue_after_update(device_id, CommandValue::Feed(FeedTrigger::Now), now);
        Ok(FeedDispatch {
            queued,
            next_feeding_at,
        })
    }

    async fn update_feeding_settings(
        &self,
        device_id: &DeviceId,
        settings: FeedingSettings,
    ) -> Result<SettingsUpdate> {
        settings.validate()?;

        let now = Utc::now();
        let mut patch = DeviceStatePatch {
            feeding_interval: settings.interval.clone(),
            feeding_quantity: settings.quantity,
            ..Default::default()
        };

        let next_feeding_at = match settings.interval.as_deref() {
            Some(spec) => {
                let state = self.read_state(device_id)?;
                let interval = FeedingInterval::parse_or_default(Some(spec));
                let next = feeding::next_feeding_at(
                    interval,
                    state.next_feeding_at,
                    FeedingPolicy::Drift,
                    now,
                );
                patch.next_feeding_at = Some(next);
                Some(next)
            }
            None => None,
        };

        self.update_state(device_id, &patch)?;

        tracing::info!(
            device_id = %device_id,
            interval = ?settings.interval,
            quantity = ?settings.quantity,
            "Feeding settings updated"
        );

        let config = FeedingConfig {
            interval: settings.interval,
            quantity: settings.quantity,
        };
        let queued = self.queue_after_update(device_id, CommandValue::Config(config), now);
        Ok(SettingsUpdate {
            next_feeding_at,
            queued,
        })
    }

    // =========================================================================
    // Device Operations
    // =========================================================================

    async fn confirm_feed(&self, device_id: &DeviceId) -> Result<DateTime<Utc>> {
        let next = self.record_feeding(device_id, Utc::now())?;

        tracing::info!(device_id = %device_id, next_feeding_at = %next, "Device confirmed feeding");

        Ok(next)
    }

    async fn poll_command(&self, device_id: &DeviceId) -> Result<Option<Command>> {
        let now = Utc::now();

        if let Err(e) = liveness::record_heartbeat(&*self.store, device_id, now) {
            tracing::warn!(device_id = %device_id, error = %e, "Failed to record heartbeat");
        }

        queue::dequeue_oldest_valid(&*self.store, device_id, self.config.command_ttl(), now)
    }

    async fn ingest_reading(
        &self,
        device_id: &DeviceId,
        upload: TelemetryUpload,
    ) -> Result<SensorReading> {
        if !upload.temperature.is_finite() {
            return Err(ControlError::InvalidInput(
                "temperature must be a finite number".into(),
            ));
        }
        if upload.water_level.is_some_and(|level| !level.is_finite()) {
            return Err(ControlError::InvalidInput(
                "water_level must be a finite number".into(),
            ));
        }

        let now = Utc::now();
        let reading = SensorReading {
            device_id: *device_id,
            temperature: upload.temperature,
            water_level: upload.water_level,
            created_at: now,
        };
        self.store.insert_sensor_reading(&reading)?;

        tracing::debug!(
            device_id = %device_id,
            temperature = reading.temperature,
            water_level = ?reading.water_level,
            "Stored sensor reading"
        );

        if let Err(e) = autopump::evaluate(
            &*self.store,
            device_id,
            reading.temperature,
            self.config.auto_pump_threshold_celsius,
            now,
        ) {
            tracing::warn!(device_id = %device_id, error = %e, "Pump automation failed");
        }

        Ok(reading)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    async fn device_status(&self, device_id: &DeviceId) -> Result<DeviceLiveness> {
        let state = self.read_state(device_id)?;
        Ok(liveness::classify(
            &state,
            Utc::now(),
            self.config.liveness_window(),
        ))
    }

    async fn dashboard(&self, device_id: &DeviceId) -> Result<DashboardSnapshot> {
        let reading = self
            .store
            .latest_sensor_reading(device_id)?
            .ok_or(ControlError::NoReadings(*device_id))?;

        let device = match self.store.get_device_state(device_id) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "Failed to read device state");
                None
            }
        };

        let last_pump_toggle = match self.store.latest_command_of_kind(device_id, CommandKind::Pump) {
            Ok(command) => command.map(|c| c.created_at),
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "Failed to read last pump command");
                None
            }
        };

        Ok(DashboardSnapshot {
            reading,
            device,
            last_pump_toggle,
        })
    }

    async fn sensor_history(
        &self,
        device_id: &DeviceId,
        range: HistoryRange,
    ) -> Result<Vec<SensorReading>> {
        let since = Utc::now() - range.duration();
        Ok(self
            .store
            .list_sensor_readings_since(device_id, since, self.config.history_limit)?)
    }
}
