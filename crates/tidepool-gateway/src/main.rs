//! Tidepool Gateway - HTTP API for the aquarium controller
//!
//! This is the main entry point for the gateway service. It opens the store,
//! makes sure the configured device has a Device State row, and serves the
//! API.
//!
//! # Environment
//!
//! - `LISTEN_ADDR`, `DATA_DIR`, `DEVICE_ID`, `CORS_ORIGINS`,
//!   `MAX_BODY_BYTES`, `REQUEST_TIMEOUT_SECONDS`: gateway settings
//! - `ADMIN_TOKEN`: bearer token for operator writes; unset leaves them open
//! - `COMMAND_TTL_SECONDS`, `LIVENESS_WINDOW_SECONDS`,
//!   `AUTO_PUMP_THRESHOLD_C`, `HISTORY_LIMIT`: control plane settings
//! - `RUST_LOG`: log filter, defaults to `info,tidepool=debug`

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tidepool_control::{ControlConfig, ControlPlane, ControlPlaneService};
use tidepool_gateway::{create_router, Authorizer, GatewayConfig, GatewayState, TokenAuthorizer};
use tidepool_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tidepool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tidepool Gateway");

    let gateway_config = GatewayConfig::from_env()?;
    let control_config = ControlConfig::from_env();

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = %gateway_config.data_dir,
        device_id = %gateway_config.device_id,
        command_ttl_seconds = control_config.command_ttl_seconds,
        liveness_window_seconds = control_config.liveness_window_seconds,
        auto_pump_threshold = control_config.auto_pump_threshold_celsius,
        "Gateway configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %gateway_config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&gateway_config.data_dir)?);

    let control = Arc::new(ControlPlaneService::new(store, control_config));
    control.provision_device(&gateway_config.device_id).await?;
    tracing::info!("Control plane initialized");

    let authorizer = Arc::new(TokenAuthorizer::from_config(
        gateway_config.admin_token.as_deref(),
    ));
    if !authorizer.is_enforcing() {
        tracing::warn!("No ADMIN_TOKEN set - operator endpoints are open");
    }

    let listen_addr = gateway_config.listen_addr.clone();
    let state = GatewayState::new(control, authorizer, gateway_config);

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
