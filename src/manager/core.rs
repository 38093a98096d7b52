//! Connection manager implementation.
//!
//! # State Machine
//!
//! ```text
//!             connect()                opened
//!   idle ───────────────► connecting ─────────► connected
//!    ▲                     │    ▲                  │
//!    │            errored/ │    │ timer fires      │ closed
//!    │         open threw  ▼    │                  ▼
//!    │                   error  reconnecting ◄── disconnected
//!    │                     │         ▲               │
//!    │                     └─────────┴───────────────┘
//!    │                        schedule (attempts left)
//!    │
//!  disconnect() from anywhere ──► disconnected (no reconnect)
//! ```
//!
//! All state sits behind one mutex. Every mutation stages its listener
//! notifications while the lock is held and flushes them after it is
//! released, so listeners may call back into the manager. The state lock is
//! never held while waiting for delivery rights.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::config::{EndpointConfig, EndpointOverride, ReconnectPolicy};
use crate::error::{Error, Result};
use crate::events::{EventBus, MessageListener, StatusListener, Subscription};
use crate::identifiers::TransportId;
use crate::transport::event::{EventReceiver, EventSender};
use crate::transport::{EventSink, Transport, TransportEvent, TransportHandle};

use super::builder::ConnectionManagerBuilder;
use super::reconnect::{PendingReconnect, ReconnectState};
use super::status::ConnectionStatus;

// ============================================================================
// Types
// ============================================================================

/// The single live transport handle.
struct LiveTransport {
    /// Id carried by every event from this handle.
    id: TransportId,
    /// Manager-side clone of the sink, detached on discard.
    sink: EventSink,
    /// Handle returned by the transport.
    handle: Box<dyn TransportHandle>,
}

/// Everything guarded by the state lock.
struct State {
    /// Stored endpoint, replaced wholesale.
    endpoint: EndpointConfig,
    /// Current status.
    status: ConnectionStatus,
    /// At most one live transport.
    live: Option<LiveTransport>,
    /// Attempt counter and pending timer.
    reconnect: ReconnectState,
}

/// Shared manager internals.
struct Inner {
    /// Self reference handed to timer and pump tasks.
    weak: Weak<Inner>,
    /// Opens transport handles.
    transport: Arc<dyn Transport>,
    /// Backoff configuration.
    policy: ReconnectPolicy,
    /// Runtime used for timers and the event pump.
    runtime: Handle,
    /// Guarded state.
    state: Mutex<State>,
    /// Listener registries.
    bus: EventBus,
    /// Cloned into every sink.
    events_tx: EventSender,
    /// Source of reconnect tickets.
    next_ticket: AtomicU64,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Keeps one WebSocket session to a device alive.
///
/// Cloning is cheap; clones share the same connection.
///
/// # Example
///
/// ```no_run
/// use device_link::{ConnectionManager, EndpointConfig, Result};
///
/// # async fn example() -> Result<()> {
/// let manager = ConnectionManager::builder()
///     .endpoint(EndpointConfig::new("192.168.1.50", 81))
///     .build()?;
///
/// let _status = manager.on_status(|status| println!("status: {status}"));
/// let _messages = manager.on_message(|text| println!("device: {text}"));
///
/// manager.connect();
/// // ... once `connected` has been observed:
/// manager.send_command("PING")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionManager")
            .field("endpoint", &state.endpoint)
            .field("status", &state.status)
            .field("attempts", &state.reconnect.attempt_count)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructors
// ============================================================================

impl ConnectionManager {
    /// Returns a builder with default endpoint, policy and transport.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Creates a manager with the default endpoint and policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when called outside a Tokio runtime.
    pub fn new(transport: impl Transport) -> Result<Self> {
        Self::builder().transport(transport).build()
    }

    /// Assembles a manager from validated parts and starts its event pump.
    pub(crate) fn from_parts(
        endpoint: EndpointConfig,
        policy: ReconnectPolicy,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let inner = Arc::new_cyclic(|weak| Inner {
            weak: weak.clone(),
            transport,
            policy,
            runtime: runtime.clone(),
            state: Mutex::new(State {
                endpoint,
                status: ConnectionStatus::Idle,
                live: None,
                reconnect: ReconnectState::default(),
            }),
            bus: EventBus::new(),
            events_tx,
            next_ticket: AtomicU64::new(1),
        });

        runtime.spawn(run_event_pump(Arc::downgrade(&inner), events_rx));

        Self { inner }
    }
}

// ============================================================================
// ConnectionManager - Configuration
// ============================================================================

impl ConnectionManager {
    /// Replaces the stored endpoint. Takes effect on the next connect.
    pub fn set_endpoint_config(&self, endpoint: EndpointConfig) {
        debug!(url = %endpoint.url(), "Endpoint replaced");
        self.inner.state.lock().endpoint = endpoint;
    }

    /// Returns the stored endpoint.
    #[must_use]
    pub fn endpoint_config(&self) -> EndpointConfig {
        self.inner.state.lock().endpoint.clone()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    /// Returns `true` if the status is `connected`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns the number of automatic attempts since the last success or
    /// explicit connect.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().reconnect.attempt_count
    }

    /// Returns `true` while a reconnect timer is outstanding.
    #[must_use]
    pub fn has_pending_reconnect(&self) -> bool {
        self.inner.state.lock().reconnect.has_pending()
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Starts connecting to the stored endpoint.
    ///
    /// No-op while `connecting`, `connected` or `reconnecting`. Returns once
    /// the attempt is under way; observe the outcome with
    /// [`on_status`](Self::on_status). Open failures are never returned,
    /// they move the status to `error` and schedule a reconnect.
    pub fn connect(&self) {
        self.inner.connect(None);
    }

    /// Merges `patch` into the stored endpoint, then behaves like
    /// [`connect`](Self::connect).
    ///
    /// The merge is persisted. It is skipped, like the rest of the call,
    /// when an attempt is already active.
    pub fn connect_with(&self, patch: &EndpointOverride) {
        self.inner.connect(Some(patch));
    }

    /// Closes the link and suppresses automatic reconnection until the next
    /// explicit connect. Idempotent.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Sends a trimmed command to the device.
    ///
    /// Blank commands are ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the status is not `connected`
    /// - [`Error::SendFailed`] if the transport refused the write, including
    ///   a socket that closed before its `closed` event was processed; the
    ///   status is then `error`/`reconnecting`
    pub fn send_command(&self, command: &str) -> Result<()> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(());
        }
        self.inner.send(command)
    }
}

// ============================================================================
// ConnectionManager - Observers
// ============================================================================

impl ConnectionManager {
    /// Registers a status listener.
    ///
    /// The listener is called once right away with the current status, then
    /// on every transition.
    pub fn on_status<F>(&self, listener: F) -> Subscription
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.on_status_listener(Arc::new(move |status: &ConnectionStatus| listener(*status)))
    }

    /// Registers a shared status listener.
    ///
    /// Registering the same `Arc` twice keeps a single registration.
    pub fn on_status_listener(&self, listener: StatusListener) -> Subscription {
        let bus = &self.inner.bus;
        let guard = bus.delivery_guard();

        let (subscription, status) = {
            let state = self.inner.state.lock();
            (bus.subscribe_status(listener), state.status)
        };
        bus.deliver_status_to(subscription.id(), status);

        drop(guard);
        bus.flush();
        subscription
    }

    /// Registers an inbound message listener.
    pub fn on_message<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_message_listener(Arc::new(listener))
    }

    /// Registers a shared inbound message listener.
    ///
    /// Registering the same `Arc` twice keeps a single registration.
    pub fn on_message_listener(&self, listener: MessageListener) -> Subscription {
        self.inner.bus.subscribe_messages(listener)
    }
}

// ============================================================================
// Inner - State Helpers
// ============================================================================

impl Inner {
    /// Runs `f` under the state lock, then delivers staged notifications.
    fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let result = {
            let mut state = self.state.lock();
            f(&mut state)
        };
        self.bus.flush();
        result
    }

    /// Records a transition and stages its notification.
    fn set_status(&self, state: &mut State, next: ConnectionStatus) {
        trace!(from = %state.status, to = %next, "Status transition");
        state.status = next;
        self.bus.stage_status(next);
    }

    /// Detaches and closes the live transport, if any.
    fn discard_transport(&self, state: &mut State) {
        if let Some(live) = state.live.take() {
            debug!(transport_id = %live.id, "Discarding transport");
            live.sink.detach();
            live.handle.close();
        }
    }
}

// ============================================================================
// Inner - Transitions
// ============================================================================

impl Inner {
    fn connect(&self, patch: Option<&EndpointOverride>) {
        self.update(|state| {
            if state.status.is_active() {
                debug!(status = %state.status, "Connect ignored, attempt already active");
                return;
            }

            if let Some(patch) = patch.filter(|patch| !patch.is_empty()) {
                state.endpoint = state.endpoint.merged(patch);
            }

            state.reconnect.manually_disconnected = false;
            state.reconnect.attempt_count = 0;
            self.open_transport(state);
        });
    }

    /// Replaces any transport with a fresh attempt at the stored endpoint.
    fn open_transport(&self, state: &mut State) {
        state.reconnect.cancel_pending();
        self.set_status(state, ConnectionStatus::Connecting);
        self.discard_transport(state);

        let url = match state.endpoint.parse_url() {
            Ok(url) => url,
            Err(e) => {
                let err = Error::open_failed(state.endpoint.url(), e.to_string());
                warn!(error = %err, "Invalid endpoint");
                self.set_status(state, ConnectionStatus::Error);
                self.schedule_reconnect(state);
                return;
            }
        };

        let id = TransportId::next();
        let sink = EventSink::new(id, self.events_tx.clone());

        match self.transport.open(&url, sink.clone()) {
            Ok(handle) => {
                debug!(transport_id = %id, %url, "Transport opening");
                state.live = Some(LiveTransport { id, sink, handle });
            }
            Err(e) => {
                warn!(%url, error = %e, "Failed to open transport");
                self.set_status(state, ConnectionStatus::Error);
                self.schedule_reconnect(state);
            }
        }
    }

    fn disconnect(&self) {
        self.update(|state| {
            state.reconnect.manually_disconnected = true;
            state.reconnect.cancel_pending();
            self.discard_transport(state);
            self.set_status(state, ConnectionStatus::Disconnected);
            info!(url = %state.endpoint.url(), "Disconnected");
        });
    }

    fn send(&self, command: &str) -> Result<()> {
        self.update(|state| {
            let result = match (&state.live, state.status) {
                (Some(live), ConnectionStatus::Connected) => live.handle.send(command),
                _ => return Err(Error::NotConnected),
            };

            match result {
                Ok(()) => {
                    trace!(command, "Command sent");
                    Ok(())
                }
                Err(e) => {
                    warn!(command, error = %e, "Send failed, reconnecting");
                    self.discard_transport(state);
                    self.set_status(state, ConnectionStatus::Error);
                    self.schedule_reconnect(state);
                    match e {
                        Error::SendFailed { .. } => Err(e),
                        other => Err(Error::send_failed(other.to_string())),
                    }
                }
            }
        })
    }

    /// Applies one event from the pump. Events from stale handles are dropped.
    fn handle_event(&self, id: TransportId, event: TransportEvent) {
        self.update(|state| {
            if state.live.as_ref().map(|live| live.id) != Some(id) {
                trace!(transport_id = %id, ?event, "Dropped event from stale transport");
                return;
            }

            match event {
                TransportEvent::Opened => {
                    state.reconnect.attempt_count = 0;
                    self.set_status(state, ConnectionStatus::Connected);
                    info!(url = %state.endpoint.url(), transport_id = %id, "Connected");
                }

                TransportEvent::Message(text) => {
                    trace!(transport_id = %id, %text, "Message received");
                    self.bus.stage_message(text);
                }

                TransportEvent::Errored(reason) => {
                    warn!(transport_id = %id, %reason, "Transport error");
                    self.set_status(state, ConnectionStatus::Error);
                }

                TransportEvent::Closed => {
                    self.discard_transport(state);
                    self.set_status(state, ConnectionStatus::Disconnected);
                    if !state.reconnect.manually_disconnected {
                        self.schedule_reconnect(state);
                    }
                }
            }
        });
    }
}

// ============================================================================
// Inner - Reconnect Scheduler
// ============================================================================

impl Inner {
    /// Schedules the next automatic attempt, or gives up with `error`.
    fn schedule_reconnect(&self, state: &mut State) {
        if state.reconnect.manually_disconnected {
            return;
        }

        if self.policy.is_exhausted(state.reconnect.attempt_count) {
            warn!(
                attempts = state.reconnect.attempt_count,
                url = %state.endpoint.url(),
                "Reconnect attempts exhausted"
            );
            self.set_status(state, ConnectionStatus::Error);
            return;
        }

        state.reconnect.cancel_pending();
        state.reconnect.attempt_count += 1;

        let attempt = state.reconnect.attempt_count;
        let delay = self.policy.delay_for(attempt);
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        self.set_status(state, ConnectionStatus::Reconnecting);
        debug!(attempt, ?delay, "Reconnect scheduled");

        let weak = self.weak.clone();
        let task = self.runtime.spawn(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_reconnect(ticket);
            }
        });

        state.reconnect.pending = Some(PendingReconnect { ticket, task });
    }

    /// Timer callback: reopens unless the timer was cancelled meanwhile.
    ///
    /// Bypasses the active-attempt guard of `connect` (the status is
    /// `reconnecting` here) and keeps the attempt count.
    fn fire_reconnect(&self, ticket: u64) {
        self.update(|state| {
            if state.reconnect.take_if_current(ticket).is_none() {
                trace!(ticket, "Ignoring cancelled reconnect timer");
                return;
            }
            if state.reconnect.manually_disconnected {
                return;
            }

            debug!(
                attempt = state.reconnect.attempt_count,
                url = %state.endpoint.url(),
                "Reconnecting"
            );
            self.open_transport(state);
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.reconnect.cancel_pending();
        if let Some(live) = state.live.take() {
            live.sink.detach();
            live.handle.close();
        }
    }
}

// ============================================================================
// Event Pump
// ============================================================================

/// Feeds transport events into the state machine, one at a time.
async fn run_event_pump(inner: Weak<Inner>, mut events_rx: EventReceiver) {
    while let Some((id, event)) = events_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_event(id, event);
    }

    debug!("Event pump terminated");
}

// ============================================================================
// Tests
// ============================================================================
