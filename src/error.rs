//! Error types for the device link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use device_link::{ConnectionManager, Result};
//!
//! fn ping(manager: &ConnectionManager) -> Result<()> {
//!     manager.send_command("PING")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Url`] |
//! | Connection | [`Error::OpenFailed`], [`Error::NotConnected`], [`Error::ConnectionClosed`] |
//! | Delivery | [`Error::SendFailed`] |
//! | External | [`Error::WebSocket`] |
//!
//! Exhausting the automatic reconnect budget is not an error value. It is
//! reported as the terminal [`ConnectionStatus::Error`](crate::ConnectionStatus::Error).

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::ParseError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when an endpoint or reconnect policy is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Connection URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] ParseError),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport could not be opened.
    ///
    /// Recovered internally by the manager: the status moves to `error` and
    /// a reconnect is scheduled. Never returned from `connect`.
    #[error("Failed to open {url}: {message}")]
    OpenFailed {
        /// URL the transport tried to open.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// A command was sent without an active connection.
    #[error("Not connected. Call connect() first")]
    NotConnected,

    /// The transport event loop has terminated.
    ///
    /// Returned by a transport handle; the manager reports it to callers as
    /// [`Error::SendFailed`].
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// The underlying socket refused an outbound command.
    ///
    /// The manager has already moved to `error` and scheduled a reconnect
    /// when this is returned.
    #[error("Send failed: {message}")]
    SendFailed {
        /// Description of the send failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// WebSocket protocol or I/O error, reported through a transport's
    /// `errored` event.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an open failed error.
    #[inline]
    pub fn open_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a send failed error.
    #[inline]
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed { .. }
                | Self::NotConnected
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed once the link is (re)established.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed { .. }
                | Self::NotConnected
                | Self::ConnectionClosed
                | Self::SendFailed { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
