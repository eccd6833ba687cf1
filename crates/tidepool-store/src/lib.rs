//! `RocksDB` storage layer for tidepool.
//!
//! This crate provides persistent storage for device state, the command queue,
//! and sensor telemetry using `RocksDB` with column families for efficient
//! indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `device_state`: one Device State row per device, keyed by `device_id`
//! - `commands`: primary command records, keyed by `command_id`
//! - `commands_pending`: index of unprocessed commands in creation order
//! - `commands_by_device`: index of every command in creation order
//! - `sensor_readings`: telemetry samples in ingestion order
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use tidepool_core::DeviceId;
//! use tidepool_store::{CommandValue, RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/tidepool-db").unwrap();
//!
//! // Queue a pump command and let the device pick it up
//! let device = DeviceId::DEFAULT;
//! store.insert_command(&device, CommandValue::Pump(true), Utc::now()).unwrap();
//! let next = store.claim_oldest_unprocessed_command(&device, Utc::now()).unwrap();
//! assert!(next.is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    Command, CommandKind, CommandValue, DeviceState, DeviceStatePatch, FeedTrigger,
    FeedingConfig, SensorReading,
};

use chrono::{DateTime, Utc};
use tidepool_core::{CommandId, DeviceId};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, fault-injecting wrappers in tests). Every method is a single
/// bounded round-trip; callers never hold state across calls.
pub trait Store: Send + Sync {
    // =========================================================================
    // Device State Operations
    // =========================================================================

    /// Insert or replace a Device State row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_device_state(&self, state: &DeviceState) -> Result<()>;

    /// Get the Device State row of a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_device_state(&self, device_id: &DeviceId) -> Result<Option<DeviceState>>;

    /// Apply a partial update to a Device State row and return the new row.
    ///
    /// Fields absent from the patch keep their stored value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the device was never provisioned.
    fn update_device_state(
        &self,
        device_id: &DeviceId,
        patch: &DeviceStatePatch,
    ) -> Result<DeviceState>;

    // =========================================================================
    // Telemetry Operations
    // =========================================================================

    /// Append a sensor reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_sensor_reading(&self, reading: &SensorReading) -> Result<()>;

    /// Get the most recent reading of a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_sensor_reading(&self, device_id: &DeviceId) -> Result<Option<SensorReading>>;

    /// List readings created at or after `since`, oldest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_sensor_readings_since(
        &self,
        device_id: &DeviceId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SensorReading>>;

    // =========================================================================
    // Command Queue Operations
    // =========================================================================

    /// Append an unprocessed command and return it with its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_command(
        &self,
        device_id: &DeviceId,
        value: CommandValue,
        created_at: DateTime<Utc>,
    ) -> Result<Command>;

    /// Get a command by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_command(&self, command_id: &CommandId) -> Result<Option<Command>>;

    /// Mark every unprocessed command of `kind` as processed.
    ///
    /// Returns the number of commands that were pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn mark_pending_processed_by_kind(
        &self,
        device_id: &DeviceId,
        kind: CommandKind,
        processed_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Select the oldest unprocessed command without changing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn oldest_unprocessed_command(&self, device_id: &DeviceId) -> Result<Option<Command>>;

    /// Mark a single command as processed.
    ///
    /// Marking an already processed command is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the command doesn't exist.
    fn mark_command_processed(
        &self,
        command_id: &CommandId,
        processed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Atomically select the oldest unprocessed command and mark it processed.
    ///
    /// Two concurrent callers never receive the same command.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn claim_oldest_unprocessed_command(
        &self,
        device_id: &DeviceId,
        processed_at: DateTime<Utc>,
    ) -> Result<Option<Command>>;

    /// Atomically supersede pending commands of the value's kind and insert the
    /// new command.
    ///
    /// Returns the inserted command and the number of superseded commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written then.
    fn replace_pending_command(
        &self,
        device_id: &DeviceId,
        value: CommandValue,
        created_at: DateTime<Utc>,
    ) -> Result<(Command, usize)>;

    /// List the unprocessed commands of a device, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_unprocessed_commands(&self, device_id: &DeviceId) -> Result<Vec<Command>>;

    /// Get the most recently created command of `kind`, processed or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_command_of_kind(
        &self,
        device_id: &DeviceId,
        kind: CommandKind,
    ) -> Result<Option<Command>>;
}
