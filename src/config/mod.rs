//! Connection configuration.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EndpointConfig`] | Where the device listens |
//! | [`EndpointOverride`] | Partial endpoint merged on `connect` |
//! | [`ReconnectPolicy`] | Backoff budget and delays |

// ============================================================================
// Submodules
// ============================================================================

/// Device endpoint and URL derivation.
pub mod endpoint;

/// Automatic reconnection policy.
pub mod reconnect;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::{EndpointConfig, EndpointOverride};
pub use reconnect::ReconnectPolicy;
