//! Device Link - resilient WebSocket sessions to embedded devices.
//!
//! This library keeps a persistent WebSocket connection to a device on the
//! local network (typically an ESP32 serving `ws://192.168.1.50:81/`),
//! recovers from drops with bounded exponential backoff, broadcasts status
//! and inbound messages to observers, and sends command strings.
//!
//! # Architecture
//!
//! - **ConnectionManager**: owns the endpoint, the live transport handle, the
//!   status state machine and the reconnect timer
//! - **Transport**: opens sockets and reports what happens on them through
//!   an event channel; [`WsTransport`] is the `tokio-tungstenite` one
//! - **EventBus**: ordered, panic-isolated delivery to status and message
//!   listeners
//!
//! Key design principles:
//!
//! - One live transport at a time; events from superseded handles are dropped
//! - At most one pending reconnect timer
//! - `disconnect()` suppresses reconnection until the next explicit `connect()`
//! - Event-driven (no polling)
//!
//! # Quick Start
//!
//! ```no_run
//! use device_link::{ConnectionManager, ConnectionStatus, EndpointConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .endpoint(EndpointConfig::new("192.168.1.50", 81))
//!         .build()?;
//!
//!     let _messages = manager.on_message(|text| println!("device: {text}"));
//!     let _status = manager.on_status(|status| println!("status: {status}"));
//!
//!     manager.connect();
//!
//!     // Later, once the status is `connected`:
//!     if manager.status() == ConnectionStatus::Connected {
//!         manager.send_command("PING")?;
//!     }
//!
//!     manager.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Endpoint and reconnect policy |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Listener registries and subscriptions |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | [`ConnectionManager`] and its builder |
//! | [`transport`] | Transport trait and WebSocket implementation |

// ============================================================================
// Modules
// ============================================================================

/// Endpoint and reconnect configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Listener registries for status and message events.
pub mod events;

/// Type-safe identifiers for transports and subscriptions.
pub mod identifiers;

/// Connection manager and status state machine.
pub mod manager;

/// Socket transport abstraction.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{EndpointConfig, EndpointOverride, ReconnectPolicy};

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{EventBus, MessageListener, StatusListener, Subscription};

// Identifier types
pub use identifiers::{SubscriptionId, TransportId};

// Manager types
pub use manager::{ConnectionManager, ConnectionManagerBuilder, ConnectionStatus};

// Transport types
pub use transport::{EventSink, Transport, TransportEvent, TransportHandle, WsTransport};
