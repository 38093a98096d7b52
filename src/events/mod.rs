//! Observer registry for connection events.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EventBus`] | Status and message registries with ordered delivery |
//! | [`ListenerRegistry`] | One set of listeners with unique membership |
//! | [`Subscription`] | Idempotent unsubscribe handle |

// ============================================================================
// Submodules
// ============================================================================

/// Status and message fan-out.
pub mod bus;

/// Listener sets and subscriptions.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{EventBus, MessageListener, StatusListener};
pub use registry::{Listener, ListenerRegistry, Subscription};
