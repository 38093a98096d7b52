//! Socket transport layer.
//!
//! The manager never touches a socket directly. It asks a [`Transport`] to
//! open a handle and learns what happens on it only through the
//! [`EventSink`] it passed in; it never polls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐    open(url, sink)    ┌───────────────────┐
//! │  ConnectionManager   │──────────────────────►│  Transport        │
//! │                      │  send(text), close()  │  (WsTransport)    │
//! │   event pump task    │◄──────────────────────│                   │
//! └──────────────────────┘  (TransportId, event) └─────────┬─────────┘
//!                                                         │ ws:// / wss://
//!                                                         ▼
//!                                                ┌───────────────────┐
//!                                                │  Device (ESP32)   │
//!                                                └───────────────────┘
//! ```
//!
//! # Handle Contract
//!
//! - `open` either fails synchronously or returns a handle whose outcome
//!   arrives later as `Opened` or `Errored`/`Closed`
//! - `Closed` is emitted at most once per handle
//! - `close` detaches the sink before shutting the socket down, so a closed
//!   handle never emits anything again
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Transport events and the delivery sink |
//! | `websocket` | `tokio-tungstenite` implementation |

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Transport events and delivery sink.
pub mod event;

/// WebSocket transport.
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{EventSink, TransportEvent, binary_to_text};
pub use websocket::WsTransport;

// ============================================================================
// Traits
// ============================================================================

/// Factory for bidirectional message sockets.
pub trait Transport: Send + Sync + 'static {
    /// Starts opening a socket to `url`.
    ///
    /// Returns as soon as the attempt is under way. Events for the new
    /// handle must be delivered through `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailed`](crate::Error::OpenFailed) if the attempt
    /// cannot even be started.
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn TransportHandle>>;
}

/// One opened socket.
pub trait TransportHandle: Send + Sync {
    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendFailed`](crate::Error::SendFailed) if the socket
    /// can no longer accept data.
    fn send(&self, text: &str) -> Result<()>;

    /// Detaches the sink and shuts the socket down. Idempotent.
    fn close(&self);
}
