//! Domain types stored in the database.
//!
//! These types represent the persisted device state, command queue entries,
//! and sensor readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidepool_core::{CommandId, DeviceId};

/// Kind of a queued command, one mailbox slot per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    /// Water pump on/off.
    Pump,
    /// Dispense food now.
    Feed,
    /// Light brightness.
    Light,
    /// Feeding configuration push.
    Config,
}

impl CommandKind {
    /// The wire name of the kind (`PUMP`, `FEED`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pump => "PUMP",
            Self::Feed => "FEED",
            Self::Light => "LIGHT",
            Self::Config => "CONFIG",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `FEED` command. The device only understands `"NOW"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedTrigger {
    /// Dispense immediately.
    #[serde(rename = "NOW")]
    Now,
}

/// Payload of a `CONFIG` command.
///
/// Only the fields that changed are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingConfig {
    /// New feeding interval specification (e.g. `"4h"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// New number of portions per feeding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// The instruction carried by a command, keyed by its kind.
///
/// Serializes as `{"type": "PUMP", "value": true}`, which is exactly what the
/// device expects from a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "UPPERCASE")]
pub enum CommandValue {
    /// Switch the pump on (`true`) or off (`false`).
    Pump(bool),
    /// Feed now.
    Feed(FeedTrigger),
    /// Set brightness, 0-100.
    Light(u8),
    /// Push feeding settings.
    Config(FeedingConfig),
}

impl CommandValue {
    /// The mailbox slot this value occupies.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Pump(_) => CommandKind::Pump,
            Self::Feed(_) => CommandKind::Feed,
            Self::Light(_) => CommandKind::Light,
            Self::Config(_) => CommandKind::Config,
        }
    }
}

/// A command record in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Unique identifier, assigned by the store.
    pub id: CommandId,
    /// Target device.
    pub device_id: DeviceId,
    /// The instruction.
    pub value: CommandValue,
    /// Creation timestamp; drives ordering and expiry.
    pub created_at: DateTime<Utc>,
    /// Whether the command was delivered, superseded, or expired.
    pub processed: bool,
    /// When `processed` flipped to true.
    pub processed_at: Option<DateTime<Utc>>,
}

impl Command {
    /// Convenience accessor for the command kind.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        self.value.kind()
    }

    /// Mark the command processed at the given instant.
    ///
    /// Returns false if it was already processed, leaving `processed_at` untouched.
    pub fn mark_processed(&mut self, at: DateTime<Utc>) -> bool {
        if self.processed {
            return false;
        }
        self.processed = true;
        self.processed_at = Some(at);
        true
    }
}

/// Current actuator and configuration state of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Device this row belongs to.
    pub device_id: DeviceId,
    /// Whether the pump should be running.
    pub pump_active: bool,
    /// Light brightness, 0-100.
    pub brightness: u8,
    /// Free-form interval specification (`"4h"`, `"30s"`, `"90m"`, `"5"`).
    pub feeding_interval: String,
    /// Portions per feeding.
    pub feeding_quantity: u32,
    /// Last time food was dispensed.
    pub last_fed_at: Option<DateTime<Utc>>,
    /// Next scheduled feeding.
    pub next_feeding_at: Option<DateTime<Utc>>,
    /// Most recent poll from the device.
    pub last_seen: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl DeviceState {
    /// Interval stored on freshly provisioned devices.
    pub const DEFAULT_FEEDING_INTERVAL: &'static str = "4h";

    /// Build the provisioning defaults for a device.
    #[must_use]
    pub fn provisioned(device_id: DeviceId, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            pump_active: false,
            brightness: 0,
            feeding_interval: Self::DEFAULT_FEEDING_INTERVAL.to_string(),
            feeding_quantity: 1,
            last_fed_at: None,
            next_feeding_at: None,
            last_seen: None,
            updated_at: now,
        }
    }
}

/// A partial update to a `DeviceState`.
///
/// `None` fields are left untouched, so concurrent patches touching different
/// fields do not clobber each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceStatePatch {
    /// New pump state.
    pub pump_active: Option<bool>,
    /// New brightness.
    pub brightness: Option<u8>,
    /// New feeding interval.
    pub feeding_interval: Option<String>,
    /// New feeding quantity.
    pub feeding_quantity: Option<u32>,
    /// New last-fed timestamp.
    pub last_fed_at: Option<DateTime<Utc>>,
    /// New next-feeding timestamp.
    pub next_feeding_at: Option<DateTime<Utc>>,
    /// New heartbeat timestamp.
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceStatePatch {
    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch in place and bump `updated_at`.
    pub fn apply(&self, state: &mut DeviceState, now: DateTime<Utc>) {
        if let Some(pump_active) = self.pump_active {
            state.pump_active = pump_active;
        }
        if let Some(brightness) = self.brightness {
            state.brightness = brightness;
        }
        if let Some(interval) = &self.feeding_interval {
            state.feeding_interval.clone_from(interval);
        }
        if let Some(quantity) = self.feeding_quantity {
            state.feeding_quantity = quantity;
        }
        if self.last_fed_at.is_some() {
            state.last_fed_at = self.last_fed_at;
        }
        if self.next_feeding_at.is_some() {
            state.next_feeding_at = self.next_feeding_at;
        }
        if self.last_seen.is_some() {
            state.last_seen = self.last_seen;
        }
        state.updated_at = now;
    }
}

/// A telemetry sample uploaded by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Device that reported the sample.
    pub device_id: DeviceId,
    /// Water temperature in °C.
    pub temperature: f64,
    /// Water level percentage, if the device has the sensor.
    #[serde(default)]
    pub water_level: Option<f64>,
    /// Ingestion timestamp.
    pub created_at: DateTime<Utc>,
}
