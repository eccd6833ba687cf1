//! HTTP gateway for the tidepool aquarium controller.
//!
//! This crate provides the API used by the dashboard and by the tank
//! controller firmware. It handles:
//!
//! - Operator writes (pump, light, feeding) guarded by an [`auth::Authorizer`]
//! - Device polling, feed confirmation and telemetry upload
//! - Dashboard queries (latest reading, history, online status)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │      Dashboard       │        │   Tank controller    │
//! └──────────────────────┘        └──────────────────────┘
//!            │  writes / queries             │  poll / upload
//!            ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tidepool-gateway                       │
//! │  ┌─────────────┐ ┌─────────────────┐ ┌───────────────────┐  │
//! │  │ AdminAccess │ │ Router/Handlers │ │ Trace/CORS/Limits │  │
//! │  └─────────────┘ └─────────────────┘ └───────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ┌──────────────────┐
//!                    │  Control Plane   │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tidepool_control::ControlPlaneService;
//! use tidepool_gateway::{create_router, GatewayConfig, GatewayState, TokenAuthorizer};
//! use tidepool_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/tidepool")?);
//! let control = Arc::new(ControlPlaneService::with_defaults(store));
//! let authorizer = Arc::new(TokenAuthorizer::with_token("s3cret"));
//!
//! let state = GatewayState::new(control, authorizer, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, GatewayConfig};
pub use error::ApiError;
pub use extract::ApiJson;
pub use routes::create_router;
pub use state::GatewayState;

// Re-export key types for convenience
pub use auth::{AdminAccess, AuthError, Authorizer, TokenAuthorizer};
