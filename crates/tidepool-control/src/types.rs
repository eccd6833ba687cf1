//! Request, outcome and configuration types for control plane operations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tidepool_store::{Command, CommandValue, DeviceState, SensorReading};

use crate::error::{ControlError, Result};

/// Requested change of feeding settings. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingSettings {
    /// New interval specification, e.g. `"6h"`.
    #[serde(default)]
    pub interval: Option<String>,
    /// New number of portions.
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl FeedingSettings {
    /// Check the request before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidInput` if no field is set, the interval is
    /// blank, or the quantity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_none() && self.quantity.is_none() {
            return Err(ControlError::InvalidInput("no settings provided".into()));
        }
        if self.interval.as_deref().is_some_and(|i| i.trim().is_empty()) {
            return Err(ControlError::InvalidInput("interval must not be empty".into()));
        }
        if self.quantity == Some(0) {
            return Err(ControlError::InvalidInput("quantity must be positive".into()));
        }
        Ok(())
    }
}

/// Telemetry sample as uploaded by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpload {
    /// Water temperature in °C.
    pub temperature: f64,
    /// Water level percentage.
    #[serde(default)]
    pub water_level: Option<f64>,
}

/// Result of a write that queues a command.
///
/// `queued` is `None` when the Device State was updated but queueing failed;
/// the failure has been logged and the next write of the same kind heals it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// The instruction that was requested.
    pub value: CommandValue,
    /// The stored command, if queueing succeeded.
    pub queued: Option<Command>,
}

/// Result of a manual feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDispatch {
    /// The queued `FEED` command, if queueing succeeded.
    pub queued: Option<Command>,
    /// Newly scheduled feeding.
    pub next_feeding_at: DateTime<Utc>,
}

/// Result of a feeding settings change.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsUpdate {
    /// Rescheduled feeding, present only when the interval changed.
    pub next_feeding_at: Option<DateTime<Utc>>,
    /// The queued `CONFIG` command, if queueing succeeded.
    pub queued: Option<Command>,
}

/// What the Auto-Pump Controller did with a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoPumpOutcome {
    /// Temperature at or below the threshold.
    BelowThreshold,
    /// Pump already on; nothing queued.
    AlreadyActive,
    /// Pump switched on; carries the queued command if queueing succeeded.
    Activated(Option<Command>),
}

/// Online/offline classification of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceLiveness {
    /// Whether the device polled within the liveness window.
    pub online: bool,
    /// Last poll, if any.
    pub last_seen: Option<DateTime<Utc>>,
}

/// Dashboard snapshot combining the latest reading with device state.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    /// Most recent telemetry.
    pub reading: SensorReading,
    /// Device State, absent if it could not be read.
    pub device: Option<DeviceState>,
    /// Creation time of the most recent `PUMP` command.
    pub last_pump_toggle: Option<DateTime<Utc>>,
}

/// Window for telemetry history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryRange {
    /// Last 24 hours.
    #[default]
    Day,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
}

impl HistoryRange {
    /// Parse a range token, defaulting to 24 hours for anything unknown.
    #[must_use]
    pub fn parse_or_default(token: Option<&str>) -> Self {
        match token {
            Some("7d") => Self::Week,
            Some("30d") => Self::Month,
            _ => Self::Day,
        }
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }
}

/// Configuration for the control plane service.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Commands older than this are discarded instead of delivered (seconds).
    #[serde(default = "ControlConfig::default_command_ttl")]
    pub command_ttl_seconds: i64,
    /// A device is online if it polled within this window (seconds).
    #[serde(default = "ControlConfig::default_liveness_window")]
    pub liveness_window_seconds: i64,
    /// Readings strictly above this temperature switch the pump on (°C).
    #[serde(default = "ControlConfig::default_auto_pump_threshold")]
    pub auto_pump_threshold_celsius: f64,
    /// Maximum rows returned by a history query.
    #[serde(default = "ControlConfig::default_history_limit")]
    pub history_limit: usize,
}

impl ControlConfig {
    const fn default_command_ttl() -> i64 {
        600 // 10 minutes
    }

    const fn default_liveness_window() -> i64 {
        60
    }

    const fn default_auto_pump_threshold() -> f64 {
        28.0
    }

    const fn default_history_limit() -> usize {
        500
    }

    /// Build a configuration from environment variables, keeping defaults
    /// for anything unset or unparseable.
    ///
    /// Reads `COMMAND_TTL_SECONDS`, `LIVENESS_WINDOW_SECONDS`,
    /// `AUTO_PUMP_THRESHOLD_C` and `HISTORY_LIMIT`.
    #[must_use]
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            command_ttl_seconds: var("COMMAND_TTL_SECONDS").unwrap_or(defaults.command_ttl_seconds),
            liveness_window_seconds: var("LIVENESS_WINDOW_SECONDS")
                .unwrap_or(defaults.liveness_window_seconds),
            auto_pump_threshold_celsius: var("AUTO_PUMP_THRESHOLD_C")
                .unwrap_or(defaults.auto_pump_threshold_celsius),
            history_limit: var("HISTORY_LIMIT").unwrap_or(defaults.history_limit),
        }
    }

    /// Get the command staleness window as a `Duration`.
    ///
    /// Negative or out-of-range values fall back to the default.
    #[must_use]
    pub fn command_ttl(&self) -> Duration {
        window(self.command_ttl_seconds, Self::default_command_ttl())
    }

    /// Get the liveness window as a `Duration`.
    ///
    /// Negative or out-of-range values fall back to the default.
    #[must_use]
    pub fn liveness_window(&self) -> Duration {
        window(self.liveness_window_seconds, Self::default_liveness_window())
    }
}

fn window(seconds: i64, default: i64) -> Duration {
    Some(seconds)
        .filter(|s| *s >= 0)
        .and_then(Duration::try_seconds)
        .unwrap_or_else(|| Duration::seconds(default))
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            command_ttl_seconds: Self::default_command_ttl(),
            liveness_window_seconds: Self::default_liveness_window(),
            auto_pump_threshold_celsius: Self::default_auto_pump_threshold(),
            history_limit: Self::default_history_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_require_a_field() {
        let err = FeedingSettings::default().validate().unwrap_err();
        assert!(matches!(err, ControlError::InvalidInput(msg) if msg == "no settings provided"));
    }

    #[test]
    fn settings_reject_blank_interval_and_zero_quantity() {
        let blank = FeedingSettings {
            interval: Some("  ".into()),
            quantity: None,
        };
        assert!(blank.validate().is_err());

        let zero = FeedingSettings {
            interval: None,
            quantity: Some(0),
        };
        assert!(zero.validate().is_err());

        let ok = FeedingSettings {
            interval: Some("6h".into()),
            quantity: Some(2),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn history_range_parsing() {
        assert_eq!(HistoryRange::parse_or_default(Some("7d")), HistoryRange::Week);
        assert_eq!(HistoryRange::parse_or_default(Some("30d")), HistoryRange::Month);
        assert_eq!(HistoryRange::parse_or_default(Some("1y")), HistoryRange::Day);
        assert_eq!(HistoryRange::parse_or_default(None), HistoryRange::Day);
        assert_eq!(HistoryRange::Week.duration(), Duration::days(7));
    }

    #[test]
    fn control_config_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.command_ttl(), Duration::minutes(10));
        assert_eq!(config.liveness_window(), Duration::seconds(60));
        assert!((config.auto_pump_threshold_celsius - 28.0).abs() < f64::EPSILON);
        assert_eq!(config.history_limit, 500);
    }

    #[test]
    fn oversized_windows_fall_back_to_defaults() {
        let config = ControlConfig {
            command_ttl_seconds: i64::MAX,
            liveness_window_seconds: -5,
            ..ControlConfig::default()
        };
        assert_eq!(config.command_ttl(), Duration::minutes(10));
        assert_eq!(config.liveness_window(), Duration::seconds(60));

        let config = ControlConfig {
            command_ttl_seconds: 30,
            ..ControlConfig::default()
        };
        assert_eq!(config.command_ttl(), Duration::seconds(30));
    }

    #[test]
    fn control_config_deserializes_with_defaults() {
        let config: ControlConfig =
            serde_json::from_str(r#"{"auto_pump_threshold_celsius": 30.5}"#).unwrap();
        assert!((config.auto_pump_threshold_celsius - 30.5).abs() < f64::EPSILON);
        assert_eq!(config.command_ttl_seconds, 600);
    }
}
