//! Core identifier types for tidepool.
//!
//! This module provides strongly-typed identifiers for devices and commands.
//! Both are UUID-backed so they encode to fixed-width keys in storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 16-byte device identifier.
///
/// Every Device State row and every queued command belongs to exactly one
/// device. Operations take the device explicitly instead of relying on a
/// process-wide singleton.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(uuid::Uuid);

impl DeviceId {
    /// The device provisioned by a fresh installation.
    pub const DEFAULT: Self = Self(uuid::Uuid::from_u128(1));

    /// Generate a new random `DeviceId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the bytes of the UUID.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for DeviceId {
    type Err = IdError;

    /// Parse a `DeviceId` from a UUID string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0.to_string()
    }
}


/// A 16-byte command identifier based on UUID v4.
///
/// Assigned by the store when a command is inserted; carries no ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandId(uuid::Uuid);

impl CommandId {
    /// Create a new `CommandId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }

    /// Generate a new random `CommandId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the bytes of the UUID.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl FromStr for CommandId {
    type Err = IdError;

    /// Parse a `CommandId` from a UUID string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandId({})", self.0)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CommandId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CommandId> for String {
    fn from(id: CommandId) -> Self {
        id.0.to_string()
    }
}


/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_device_is_fixed() {
        assert_eq!(
            DeviceId::DEFAULT.to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
        assert_eq!(DeviceId::default(), DeviceId::DEFAULT);
    }

    #[test]
    fn device_id_parse() {
        let id = DeviceId::generate();
        let parsed = DeviceId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn device_id_invalid_uuid() {
        let result = DeviceId::from_str("aquarium-1");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }

    #[test]
    fn command_id_from_bytes_matches_as_bytes() {
        let id = CommandId::generate();
        assert_eq!(CommandId::from_bytes(*id.as_bytes()), id);
    }

    #[test]
    fn command_ids_are_unique() {
        assert_ne!(CommandId::generate(), CommandId::generate());
    }

    #[test]
    fn command_id_serializes_as_string() {
        let id = CommandId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: CommandId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn device_id_rejects_bad_json() {
        let result: Result<DeviceId, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }
}
