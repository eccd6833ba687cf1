//! Core types and utilities for tidepool.
//!
//! This crate provides the identifiers shared by every tidepool crate:
//!
//! - **`DeviceId`**: addresses the aquarium controller whose state and command
//!   queue an operation touches
//! - **`CommandId`**: opaque identifier assigned to each queued command
//!
//! # Example
//!
//! ```
//! use tidepool_core::{CommandId, DeviceId};
//!
//! // The controller provisioned out of the box
//! let device = DeviceId::DEFAULT;
//! assert_eq!(device.to_string(), "00000000-0000-0000-0000-000000000001");
//!
//! // Parse a device ID from configuration
//! let parsed: DeviceId = "00000000-0000-0000-0000-000000000001".parse().unwrap();
//! assert_eq!(parsed, device);
//!
//! // Generate a command ID
//! let command_id = CommandId::generate();
//! assert_ne!(command_id, CommandId::generate());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{CommandId, DeviceId, IdError};
