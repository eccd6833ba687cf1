//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use tidepool_control::ControlPlane;

use crate::auth::Authorizer;
use crate::handlers::{control, health, sensors, system};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Operator (authorized)
/// - `POST /api/control/pump` - Switch the pump
/// - `POST /api/control/brightness` - Set light brightness
/// - `POST /api/control/feed` - Feed now
/// - `POST /api/control/feeding-settings` - Change feeding interval/quantity
///
/// ## Device
/// - `GET /api/control/latest` - Poll for the next command
/// - `POST /api/control/confirm-feed` - Report a scheduled feeding
/// - `POST /api/sensors/upload` - Upload telemetry
///
/// ## Dashboard
/// - `GET /api/sensors/latest` - Latest reading with device state
/// - `GET /api/sensors/history` - Readings for `?range=24h|7d|30d`
/// - `GET /api/system/status` - Device online status
pub fn create_router<C, A>(state: GatewayState<C, A>) -> Router
where
    C: ControlPlane + 'static,
    A: Authorizer + 'static,
{
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let cors = build_cors_layer(&cors_origins);
    let state = Arc::new(state);

    let api = Router::new()
        // Control
        .route("/control/pump", post(control::set_pump::<C, A>))
        .route("/control/brightness", post(control::set_brightness::<C, A>))
        .route("/control/feed", post(control::feed::<C, A>))
        .route(
            "/control/feeding-settings",
            post(control::update_feeding_settings::<C, A>),
        )
        .route("/control/confirm-feed", post(control::confirm_feed::<C, A>))
        .route("/control/latest", get(control::latest_command::<C, A>))
        // Sensors
        .route("/sensors/upload", post(sensors::upload::<C, A>))
        .route("/sensors/latest", get(sensors::latest::<C, A>))
        .route("/sensors/history", get(sensors::history::<C, A>))
        // System
        .route("/system/status", get(system::status::<C, A>));

    Router::new()
        .route("/health", get(health::health::<C, A>))
        .nest("/api", api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
