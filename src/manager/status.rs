//! Connection status values.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// State of the managed connection.
///
/// Serialized as the lowercase strings `idle`, `connecting`, `connected`,
/// `reconnecting`, `disconnected` and `error`, which form a stable contract
/// for UI and logging consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Nothing attempted yet.
    #[default]
    Idle,
    /// A transport is opening.
    Connecting,
    /// The transport is open.
    Connected,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting,
    /// No transport, either after a drop or a manual disconnect.
    Disconnected,
    /// Failed. Terminal once reconnect attempts are exhausted.
    Error,
}

impl ConnectionStatus {
    /// All statuses in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Connecting,
        Self::Connected,
        Self::Reconnecting,
        Self::Disconnected,
        Self::Error,
    ];

    /// Returns the wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }

    /// Returns `true` while an attempt is in flight or the link is up.
    ///
    /// An explicit `connect` is a no-op in these states.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }

    /// Returns `true` if commands can be sent.
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::config(format!("unknown connection status '{s}'")))
    }
}

// ============================================================================
// Tests
// ============================================================================
