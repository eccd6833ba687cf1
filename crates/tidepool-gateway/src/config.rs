//! Gateway configuration types.
//!
//! This module defines configuration structures for the HTTP gateway.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tidepool_core::{DeviceId, IdError};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `DEVICE_ID` is not a UUID.
    #[error("invalid DEVICE_ID: {0}")]
    InvalidDeviceId(#[from] IdError),
}

/// Configuration for the gateway service.
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// `RocksDB` data directory.
    #[serde(default = "GatewayConfig::default_data_dir")]
    pub data_dir: String,

    /// The device this gateway serves.
    #[serde(default)]
    pub device_id: DeviceId,

    /// Bearer token required for operator writes. `None` leaves them open.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_data_dir() -> String {
        "/data/tidepool".to_string()
    }

    const fn default_max_body() -> usize {
        64 * 1024 // 64 KB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDeviceId` if `DEVICE_ID` is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, keeping defaults for unset or
    /// unparseable numeric values.
    ///
    /// Reads `LISTEN_ADDR`, `DATA_DIR`, `DEVICE_ID`, `ADMIN_TOKEN`,
    /// `CORS_ORIGINS` (comma separated), `MAX_BODY_BYTES` and
    /// `REQUEST_TIMEOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDeviceId` if `DEVICE_ID` is set but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = dir;
        }
        if let Some(id) = lookup("DEVICE_ID") {
            config.device_id = id.trim().parse()?;
        }
        config.admin_token = lookup("ADMIN_TOKEN").filter(|t| !t.trim().is_empty());
        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(bytes) = lookup("MAX_BODY_BYTES").and_then(|v| v.trim().parse().ok()) {
            config.max_body_bytes = bytes;
        }
        if let Some(secs) = lookup("REQUEST_TIMEOUT_SECONDS").and_then(|v| v.trim().parse().ok()) {
            config.request_timeout_seconds = secs;
        }

        Ok(config)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            data_dir: Self::default_data_dir(),
            device_id: DeviceId::DEFAULT,
            admin_token: None,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("data_dir", &self.data_dir)
            .field("device_id", &self.device_id)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("cors_origins", &self.cors_origins)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}
