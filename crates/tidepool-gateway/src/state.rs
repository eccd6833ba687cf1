//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use tidepool_control::ControlPlane;
use tidepool_core::DeviceId;

use crate::auth::Authorizer;
use crate::config::GatewayConfig;

/// Shared application state for the gateway.
///
/// This struct holds references to all services needed by the HTTP handlers.
pub struct GatewayState<C, A>
where
    C: ControlPlane,
    A: Authorizer,
{
    /// The control plane for device operations.
    pub control: Arc<C>,
    /// Guards operator writes.
    pub authorizer: Arc<A>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C, A> GatewayState<C, A>
where
    C: ControlPlane,
    A: Authorizer,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(control: Arc<C>, authorizer: Arc<A>, config: GatewayConfig) -> Self {
        Self {
            control,
            authorizer,
            config,
        }
    }

    /// The device addressed by this gateway.
    #[must_use]
    pub const fn device_id(&self) -> &DeviceId {
        &self.config.device_id
    }
}

impl<C, A> Clone for GatewayState<C, A>
where
    C: ControlPlane,
    A: Authorizer,
{
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            authorizer: Arc::clone(&self.authorizer),
            config: self.config.clone(),
        }
    }
}
