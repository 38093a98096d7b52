//! WebSocket transport built on `tokio-tungstenite`.
//!
//! # Event Loop
//!
//! Each opened handle spawns one tokio task that:
//!
//! - connects to the device (`ws://` or `wss://`)
//! - forwards inbound text and binary frames as messages
//! - writes outbound commands queued by [`TransportHandle::send`]
//! - reports `errored` and `closed` when the socket goes away

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::event::{EventSink, binary_to_text};
use super::{Transport, TransportHandle};

// ============================================================================
// Link Phase
// ============================================================================

/// Handshake still in progress.
const PHASE_CONNECTING: u8 = 0;

/// Handshake done, frames flow.
const PHASE_OPEN: u8 = 1;

/// Event loop has exited.
const PHASE_CLOSED: u8 = 2;

// ============================================================================
// LinkCommand
// ============================================================================

/// Internal commands for the event loop.
enum LinkCommand {
    /// Write a text frame.
    Send(String),
    /// Send a close frame and stop.
    Shutdown,
}

// ============================================================================
// WsTransport
// ============================================================================

/// Production [`Transport`] speaking WebSocket to the device.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    /// Creates the transport.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn TransportHandle>> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::open_failed(
                url.as_str(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let runtime = Handle::try_current()
            .map_err(|e| Error::open_failed(url.as_str(), e.to_string()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let phase = Arc::new(AtomicU8::new(PHASE_CONNECTING));

        runtime.spawn(run_event_loop(
            url.clone(),
            command_rx,
            sink.clone(),
            Arc::clone(&phase),
        ));

        debug!(transport_id = %sink.id(), %url, "WebSocket transport opening");

        Ok(Box::new(WsHandle {
            command_tx,
            sink,
            phase,
        }))
    }
}

// ============================================================================
// WsHandle
// ============================================================================

/// Handle to one WebSocket event loop.
struct WsHandle {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    /// Sink shared with the event loop.
    sink: EventSink,
    /// One of the `PHASE_*` values, advanced by the event loop.
    phase: Arc<AtomicU8>,
}

impl TransportHandle for WsHandle {
    fn send(&self, text: &str) -> Result<()> {
        match self.phase.load(Ordering::Acquire) {
            PHASE_CONNECTING => Err(Error::NotConnected),
            PHASE_OPEN => self
                .command_tx
                .send(LinkCommand::Send(text.to_string()))
                .map_err(|_| Error::ConnectionClosed),
            _ => Err(Error::ConnectionClosed),
        }
    }

    fn close(&self) {
        self.sink.detach();
        let _ = self.command_tx.send(LinkCommand::Shutdown);
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Connects and then pumps frames until the socket or the handle goes away.
async fn run_event_loop(
    url: Url,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    sink: EventSink,
    phase: Arc<AtomicU8>,
) {
    let transport_id = sink.id();

    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let err = Error::from(e);
                warn!(%transport_id, %url, error = %err, "WebSocket connect failed");
                phase.store(PHASE_CLOSED, Ordering::Release);
                sink.errored(err.to_string());
                sink.closed();
                return;
            }
        },

        // Only a shutdown (or a dropped handle) can arrive before the
        // handshake: sends are refused until the phase is open.
        _ = command_rx.recv() => {
            debug!(%transport_id, "Closed before handshake completed");
            phase.store(PHASE_CLOSED, Ordering::Release);
            sink.closed();
            return;
        }
    };

    phase.store(PHASE_OPEN, Ordering::Release);
    sink.opened();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the device
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(%transport_id, text = %text.as_str(), "Text frame received");
                        sink.message(text.as_str());
                    }

                    Some(Ok(Message::Binary(data))) => {
                        trace!(%transport_id, len = data.len(), "Binary frame received");
                        sink.message(binary_to_text(&data));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(%transport_id, ?frame, "WebSocket closed by device");
                        break;
                    }

                    Some(Err(e)) => {
                        let err = Error::from(e);
                        error!(%transport_id, error = %err, "WebSocket error");
                        sink.errored(err.to_string());
                        break;
                    }

                    None => {
                        debug!(%transport_id, "WebSocket stream ended");
                        break;
                    }

                    // Ignore Ping, Pong and raw frames
                    _ => {}
                }
            }

            // Commands from the handle
            command = command_rx.recv() => {
                match command {
                    Some(LinkCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            let err = Error::from(e);
                            warn!(%transport_id, error = %err, "Failed to write frame");
                            sink.errored(err.to_string());
                            break;
                        }
                    }

                    Some(LinkCommand::Shutdown) => {
                        debug!(%transport_id, "Shutdown command received");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!(%transport_id, "Handle dropped");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    phase.store(PHASE_CLOSED, Ordering::Release);
    sink.closed();

    debug!(%transport_id, "Event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================
