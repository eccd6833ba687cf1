//! Heartbeat bookkeeping and online/offline classification.
//!
//! Liveness is never stored: it is derived on demand from `last_seen`, so a
//! device that stops polling goes offline without any timer.

use chrono::{DateTime, Duration, Utc};
use tidepool_core::DeviceId;
use tidepool_store::{DeviceState, DeviceStatePatch, Store};

use crate::error::{ControlError, Result};
use crate::types::DeviceLiveness;

/// Record that the device polled at `now`.
///
/// # Errors
///
/// Returns `ControlError::DeviceNotFound` if the device was never provisioned,
/// or `ControlError::StorageUnavailable` if the store fails.
pub fn record_heartbeat<S: Store + ?Sized>(
    store: &S,
    device_id: &DeviceId,
    now: DateTime<Utc>,
) -> Result<DeviceState> {
    let patch = DeviceStatePatch {
        last_seen: Some(now),
        ..Default::default()
    };
    let state = store
        .update_device_state(device_id, &patch)
        .map_err(|e| ControlError::for_device(device_id, e))?;

    tracing::debug!(device_id = %device_id, "Processed heartbeat");
    Ok(state)
}

/// A device is online iff it was seen strictly less than `window` ago.
#[must_use]
pub fn is_online(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    last_seen.is_some_and(|seen| now - seen < window)
}

/// Classify a device from its state.
#[must_use]
pub fn classify(state: &DeviceState, now: DateTime<Utc>, window: Duration) -> DeviceLiveness {
    DeviceLiveness {
        online: is_online(state.last_seen, now, window),
        last_seen: state.last_seen,
    }
}
