//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Device State rows, keyed by `device_id`.
    pub const DEVICE_STATE: &str = "device_state";

    /// Primary command records, keyed by `command_id`.
    pub const COMMANDS: &str = "commands";

    /// Index: unprocessed commands, keyed by `device_id || created_at || command_id`.
    pub const COMMANDS_PENDING: &str = "commands_pending";

    /// Index: every command ever queued, keyed by `device_id || created_at || command_id`.
    pub const COMMANDS_BY_DEVICE: &str = "commands_by_device";

    /// Sensor readings, keyed by `device_id || created_at || nonce`.
    pub const SENSOR_READINGS: &str = "sensor_readings";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::DEVICE_STATE,
        cf::COMMANDS,
        cf::COMMANDS_PENDING,
        cf::COMMANDS_BY_DEVICE,
        cf::SENSOR_READINGS,
    ]
}
