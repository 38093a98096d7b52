//! Connection manager module.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | State machine, reconnect scheduler, command path |
//! | [`ConnectionManagerBuilder`] | Fluent configuration builder |
//! | [`ConnectionStatus`] | Observable connection state |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for manager configuration.
pub mod builder;

/// Core manager implementation.
pub mod core;

/// Reconnect bookkeeping.
mod reconnect;

/// Connection status values.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use self::core::ConnectionManager;
pub use status::ConnectionStatus;
