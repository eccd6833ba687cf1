//! Control plane for the tidepool aquarium controller.
//!
//! This crate holds the core logic between the HTTP surface and the store:
//! the command queue, the feeding scheduler, pump automation and device
//! liveness.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Gateway (HTTP)                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ControlPlaneService                      │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────┐    │
//! │  │  Queue   │ │ Feeding  │ │ AutoPump │ │   Liveness   │    │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌──────────────┐
//!                       │    Store     │
//!                       │  (RocksDB)   │
//!                       └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tidepool_control::{ControlPlane, ControlPlaneService, DeviceId};
//! use tidepool_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/tidepool")?);
//! let control = ControlPlaneService::with_defaults(store);
//!
//! let device = DeviceId::DEFAULT;
//! control.provision_device(&device).await?;
//!
//! // Operator switches the pump on
//! control.set_pump(&device, true).await?;
//!
//! // Device polls and receives the command
//! if let Some(command) = control.poll_command(&device).await? {
//!     println!("deliver {:?}", command.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Write Path
//!
//! Operator writes update the Device State first and abort if that fails.
//! Queueing the matching command is best effort: a failure is logged and the
//! write still succeeds, since the next write of the same kind supersedes
//! whatever is pending anyway.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod autopump;
pub mod error;
pub mod feeding;
pub mod liveness;
pub mod queue;
pub mod service;
pub mod types;

pub use error::{ControlError, Result};
pub use feeding::{FeedingInterval, FeedingPolicy};
pub use service::{ControlPlane, ControlPlaneService, MAX_BRIGHTNESS};
pub use types::{
    AutoPumpOutcome, ControlConfig, DashboardSnapshot, DeviceLiveness, Dispatch, FeedDispatch,
    FeedingSettings, HistoryRange, SettingsUpdate, TelemetryUpload,
};

// Re-export commonly used types from dependencies for convenience
pub use tidepool_core::{CommandId, DeviceId};
pub use tidepool_store::{
    Command, CommandKind, CommandValue, DeviceState, FeedTrigger, FeedingConfig, SensorReading,
};
