//! Error types for the control plane.
//!
//! This module defines all errors that can occur while driving the command
//! queue, the feeding schedule and telemetry ingestion.

use tidepool_core::DeviceId;
use tidepool_store::StoreError;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The device has no Device State row.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// The device has not uploaded any telemetry yet.
    #[error("no sensor readings for device: {0}")]
    NoReadings(DeviceId),

    /// A required field is missing or out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

impl ControlError {
    /// Map a store error for an operation on `device_id`, turning a missing
    /// Device State row into `DeviceNotFound`.
    #[must_use]
    pub fn for_device(device_id: &DeviceId, err: StoreError) -> Self {
        if err.is_not_found() {
            Self::DeviceNotFound(*device_id)
        } else {
            Self::StorageUnavailable(err)
        }
    }
}
