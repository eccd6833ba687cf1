//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions to encode and decode keys for the command
//! queue and telemetry indexes. Timestamps are encoded so that byte order
//! equals chronological order, which turns "oldest pending command" and
//! "readings since" into prefix scans.

use chrono::{DateTime, Utc};
use tidepool_core::{CommandId, DeviceId};

/// Width of an encoded timestamp.
pub const TIMESTAMP_LEN: usize = 8;

const DEVICE_LEN: usize = 16;
const COMMAND_LEN: usize = 16;

/// Encode a timestamp as order-preserving big-endian microseconds.
///
/// The sign bit is flipped so pre-epoch instants sort before post-epoch ones.
#[must_use]
pub fn encode_timestamp(at: DateTime<Utc>) -> [u8; TIMESTAMP_LEN] {
    #[allow(clippy::cast_sign_loss)]
    let biased = (at.timestamp_micros() as u64) ^ (1 << 63);
    biased.to_be_bytes()
}

/// Encode a device key (just the device ID bytes).
#[must_use]
pub fn device_key(device_id: &DeviceId) -> Vec<u8> {
    device_id.as_bytes().to_vec()
}

/// Encode a device prefix for scanning every entry of one device.
#[must_use]
pub fn device_prefix(device_id: &DeviceId) -> Vec<u8> {
    device_id.as_bytes().to_vec()
}

/// Encode a command key (just the command ID bytes).
#[must_use]
pub fn command_key(command_id: &CommandId) -> Vec<u8> {
    command_id.as_bytes().to_vec()
}

/// Encode a device-time-command index key: `device_id || created_at || command_id`.
///
/// Used by both the pending index and the full per-device command log, so a
/// forward scan over a device prefix yields commands oldest first.
#[must_use]
pub fn device_command_key(
    device_id: &DeviceId,
    created_at: DateTime<Utc>,
    command_id: &CommandId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(DEVICE_LEN + TIMESTAMP_LEN + COMMAND_LEN);
    key.extend_from_slice(device_id.as_bytes());
    key.extend_from_slice(&encode_timestamp(created_at));
    key.extend_from_slice(command_id.as_bytes());
    key
}

/// Extract the command ID from a device-time-command key.
///
/// # Panics
///
/// Panics if the key is not at least 40 bytes.
#[must_use]
pub fn extract_command_id(key: &[u8]) -> CommandId {
    let start = DEVICE_LEN + TIMESTAMP_LEN;
    let mut bytes = [0u8; COMMAND_LEN];
    bytes.copy_from_slice(&key[start..start + COMMAND_LEN]);
    CommandId::from_bytes(bytes)
}

/// Encode a sensor reading key: `device_id || created_at || nonce`.
///
/// The nonce keeps two readings ingested in the same microsecond apart.
#[must_use]
pub fn reading_key(device_id: &DeviceId, created_at: DateTime<Utc>, nonce: &[u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(DEVICE_LEN + TIMESTAMP_LEN + 16);
    key.extend_from_slice(device_id.as_bytes());
    key.extend_from_slice(&encode_timestamp(created_at));
    key.extend_from_slice(nonce);
    key
}

/// Encode the seek position for a device's entries at or after `since`.
#[must_use]
pub fn device_time_seek(device_id: &DeviceId, since: DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(DEVICE_LEN + TIMESTAMP_LEN);
    key.extend_from_slice(device_id.as_bytes());
    key.extend_from_slice(&encode_timestamp(since));
    key
}

/// Encode a key that sorts after every entry of the device.
///
/// Used as the starting point of reverse scans ("most recent first").
#[must_use]
pub fn device_upper_bound(device_id: &DeviceId) -> Vec<u8> {
    let mut key = device_prefix(device_id);
    key.extend_from_slice(&[0xFF; TIMESTAMP_LEN + COMMAND_LEN + 1]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn timestamp_encoding_preserves_order() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let before = epoch - Duration::days(1);
        let after = epoch + Duration::microseconds(1);
        let later = Utc::now();

        assert!(encode_timestamp(before) < encode_timestamp(epoch));
        assert!(encode_timestamp(epoch) < encode_timestamp(after));
        assert!(encode_timestamp(after) < encode_timestamp(later));
    }

    #[test]
    fn device_command_key_roundtrip() {
        let device_id = DeviceId::DEFAULT;
        let command_id = CommandId::generate();

        let key = device_command_key(&device_id, Utc::now(), &command_id);
        assert_eq!(key.len(), 40);
        assert!(key.starts_with(&device_prefix(&device_id)));
        assert_eq!(extract_command_id(&key), command_id);
    }

    #[test]
    fn older_commands_sort_first() {
        let device_id = DeviceId::DEFAULT;
        let now = Utc::now();

        let older = device_command_key(&device_id, now - Duration::seconds(1), &CommandId::generate());
        let newer = device_command_key(&device_id, now, &CommandId::generate());
        assert!(older < newer);
    }

    #[test]
    fn upper_bound_sorts_after_entries() {
        let device_id = DeviceId::DEFAULT;
        let key = device_command_key(&device_id, Utc::now(), &CommandId::generate());
        assert!(key < device_upper_bound(&device_id));

        let seek = device_time_seek(&device_id, Utc::now() - Duration::hours(1));
        assert!(seek < key);
    }
}
