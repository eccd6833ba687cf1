//! Temperature-driven pump automation.

use chrono::{DateTime, Utc};
use tidepool_core::DeviceId;
use tidepool_store::{CommandValue, DeviceStatePatch, Store};

use crate::error::{ControlError, Result};
use crate::queue;
use crate::types::AutoPumpOutcome;

/// Switch the pump on when `temperature` is strictly above `threshold` and the
/// pump is off.
///
/// An already running pump is left alone, so repeated hot readings queue a
/// single command. Queueing failures after the state update are logged and
/// reported as `Activated(None)`.
///
/// # Errors
///
/// Returns an error if the Device State cannot be read or updated.
pub fn evaluate<S: Store + ?Sized>(
    store: &S,
    device_id: &DeviceId,
    temperature: f64,
    threshold: f64,
    now: DateTime<Utc>,
) -> Result<AutoPumpOutcome> {
    if temperature <= threshold || temperature.is_nan() {
        return Ok(AutoPumpOutcome::BelowThreshold);
    }

    let state = store
        .get_device_state(device_id)?
        .ok_or(ControlError::DeviceNotFound(*device_id))?;
    if state.pump_active {
        tracing::debug!(device_id = %device_id, temperature, "Pump already active");
        return Ok(AutoPumpOutcome::AlreadyActive);
    }

    let patch = DeviceStatePatch {
        pump_active: Some(true),
        ..Default::default()
    };
    store
        .update_device_state(device_id, &patch)
        .map_err(|e| ControlError::for_device(device_id, e))?;

    tracing::info!(device_id = %device_id, temperature, threshold, "Auto-activating pump");

    let queued = match queue::submit(store, device_id, CommandValue::Pump(true), now) {
        Ok(command) => Some(command),
        Err(e) => {
            tracing::warn!(device_id = %device_id, error = %e, "Failed to queue automatic pump command");
            None
        }
    };
    Ok(AutoPumpOutcome::Activated(queued))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_store::{CommandKind, DeviceState, RocksStore};
    use tempfile::TempDir;

    const THRESHOLD: f64 = 28.0;

    fn setup() -> (RocksStore, TempDir, DeviceId) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let device = DeviceId::DEFAULT;
        store
            .put_device_state(&DeviceState::provisioned(device, Utc::now()))
            .unwrap();
        (store, dir, device)
    }

    #[test]
    fn hot_reading_activates_pump_once() {
        let (store, _dir, device) = setup();

        let outcome = evaluate(&store, &device, 29.0, THRESHOLD, Utc::now()).unwrap();
        assert!(matches!(outcome, AutoPumpOutcome::Activated(Some(_))));
        assert!(store.get_device_state(&device).unwrap().unwrap().pump_active);

        let outcome = evaluate(&store, &device, 29.0, THRESHOLD, Utc::now()).unwrap();
        assert_eq!(outcome, AutoPumpOutcome::AlreadyActive);

        let pending = store.list_unprocessed_commands(&device).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].value, CommandValue::Pump(true));
    }

    #[test]
    fn threshold_is_exclusive() {
        let (store, _dir, device) = setup();

        let outcome = evaluate(&store, &device, 28.0, THRESHOLD, Utc::now()).unwrap();
        assert_eq!(outcome, AutoPumpOutcome::BelowThreshold);
        assert!(!store.get_device_state(&device).unwrap().unwrap().pump_active);
        assert!(store
            .latest_command_of_kind(&device, CommandKind::Pump)
            .unwrap()
            .is_none());
    }

    #[test]
    fn activation_supersedes_pending_pump_off() {
        let (store, _dir, device) = setup();
        let now = Utc::now();
        queue::submit(&store, &device, CommandValue::Pump(false), now).unwrap();

        evaluate(&store, &device, 30.5, THRESHOLD, now).unwrap();

        let pending = store.list_unprocessed_commands(&device).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].value, CommandValue::Pump(true));
    }

    #[test]
    fn unknown_device_is_an_error() {
        let (store, _dir, _) = setup();
        let result = evaluate(&store, &DeviceId::generate(), 35.0, THRESHOLD, Utc::now());
        assert!(matches!(result, Err(ControlError::DeviceNotFound(_))));
    }
}
