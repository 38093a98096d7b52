//! Transport events and the sink that delivers them.
//!
//! Every opened transport handle gets its own [`EventSink`]. The sink tags
//! events with the handle's [`TransportId`] and enforces the delivery
//! rules the manager relies on:
//!
//! - `closed` is delivered at most once, and nothing follows it
//! - nothing is delivered after [`EventSink::detach`]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::TransportId;

// ============================================================================
// Types
// ============================================================================

/// Sending half of the manager's event channel.
pub type EventSender = mpsc::UnboundedSender<(TransportId, TransportEvent)>;

/// Receiving half of the manager's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<(TransportId, TransportEvent)>;

// ============================================================================
// TransportEvent
// ============================================================================

/// Something that happened on a transport handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket finished opening.
    Opened,
    /// An inbound message, already converted to text.
    Message(String),
    /// The socket reported an error. `Closed` normally follows.
    Errored(String),
    /// The socket is gone.
    Closed,
}

// ============================================================================
// EventSink
// ============================================================================

/// Delivery flags shared by all clones of one sink.
#[derive(Debug, Default)]
struct SinkFlags {
    detached: AtomicBool,
    closed: AtomicBool,
}

/// Event delivery endpoint handed to [`Transport::open`](super::Transport::open).
#[derive(Debug, Clone)]
pub struct EventSink {
    id: TransportId,
    tx: EventSender,
    flags: Arc<SinkFlags>,
}

impl EventSink {
    /// Creates a sink for the given handle id.
    #[must_use]
    pub fn new(id: TransportId, tx: EventSender) -> Self {
        Self {
            id,
            tx,
            flags: Arc::new(SinkFlags::default()),
        }
    }

    /// Returns the id of the handle this sink belongs to.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> TransportId {
        self.id
    }

    /// Stops all further delivery from this sink and its clones.
    pub fn detach(&self) {
        self.flags.detached.store(true, Ordering::Release);
    }

    /// Returns `true` once [`detach`](Self::detach) was called.
    #[inline]
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.flags.detached.load(Ordering::Acquire)
    }

    /// Returns `true` once `closed` was delivered.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.flags.closed.load(Ordering::Acquire)
    }

    /// Delivers an event. Returns `false` if it was suppressed.
    pub fn emit(&self, event: TransportEvent) -> bool {
        if self.is_detached() {
            trace!(transport_id = %self.id, ?event, "Suppressed event from detached transport");
            return false;
        }

        let is_close = matches!(event, TransportEvent::Closed);
        if is_close {
            if self.flags.closed.swap(true, Ordering::AcqRel) {
                return false;
            }
        } else if self.is_closed() {
            return false;
        }

        self.tx.send((self.id, event)).is_ok()
    }

    /// Delivers [`TransportEvent::Opened`].
    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    /// Delivers [`TransportEvent::Message`].
    pub fn message(&self, text: impl Into<String>) -> bool {
        self.emit(TransportEvent::Message(text.into()))
    }

    /// Delivers [`TransportEvent::Errored`].
    pub fn errored(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Errored(reason.into()))
    }

    /// Delivers [`TransportEvent::Closed`].
    pub fn closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }
}

// ============================================================================
// Payload Conversion
// ============================================================================

/// Converts a binary payload to text.
///
/// Valid UTF-8 is passed through; anything else is base64-encoded.
#[must_use]
pub fn binary_to_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => STANDARD.encode(data),
    }
}

// ============================================================================
// Tests
// ============================================================================
