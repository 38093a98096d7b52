//! Builder pattern for manager configuration.
//!
//! # Example
//!
//! ```no_run
//! use device_link::{ConnectionManager, EndpointConfig, ReconnectPolicy};
//!
//! # fn example() -> device_link::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .endpoint(EndpointConfig::new("192.168.1.50", 81).with_path("/ws"))
//!     .reconnect(ReconnectPolicy {
//!         max_attempts: 5,
//!         ..ReconnectPolicy::default()
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::{EndpointConfig, ReconnectPolicy};
use crate::error::{Error, Result};
use crate::transport::{Transport, WsTransport};

use super::core::ConnectionManager;

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectionManagerBuilder {
    /// Initial endpoint.
    endpoint: Option<EndpointConfig>,
    /// Backoff configuration.
    policy: Option<ReconnectPolicy>,
    /// Socket factory.
    transport: Option<Arc<dyn Transport>>,
}

impl std::fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Creates a builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial endpoint.
    ///
    /// Defaults to `ws://192.168.1.50:81/`.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Replaces the WebSocket transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the manager with validation.
    ///
    /// Must be called from within a Tokio runtime; the manager keeps a
    /// handle to it for its timers and event pump.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint or policy is invalid
    /// - [`Error::Config`] if no Tokio runtime is running
    pub fn build(self) -> Result<ConnectionManager> {
        let endpoint = self.endpoint.unwrap_or_default();
        endpoint.validate()?;

        let policy = self.policy.unwrap_or_default();
        policy.validate()?;

        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("a Tokio runtime is required: {e}")))?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::new()));

        Ok(ConnectionManager::from_parts(
            endpoint, policy, transport, runtime,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
