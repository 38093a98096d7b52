//! Ordered fan-out of status and message events.
//!
//! Publishing is split in two steps. `stage_*` records a delivery (value
//! plus a snapshot of the current listeners) in a FIFO outbox and is cheap
//! enough to call while holding the manager's state lock. `flush` runs the
//! staged deliveries and must be called with no lock held.
//!
//! Only one thread drains the outbox at a time; a flush from another thread
//! blocks until that drain is over, so staged events have been delivered by
//! the time `flush` returns. A publish made from inside a listener is
//! appended and delivered after the current one, so listeners always
//! observe transitions in the order they were staged.

// ============================================================================
// Imports
// ============================================================================

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::identifiers::SubscriptionId;
use crate::manager::ConnectionStatus;

use super::registry::{Listener, ListenerRegistry, Subscription};

// ============================================================================
// Types
// ============================================================================

/// Status listener callback.
pub type StatusListener = Listener<ConnectionStatus>;

/// Inbound message listener callback.
pub type MessageListener = Listener<str>;

/// A staged delivery.
type Job = Box<dyn FnOnce() + Send>;

// ============================================================================
// EventBus
// ============================================================================

/// Observer registry for connection status and inbound messages.
pub struct EventBus {
    /// Status change listeners.
    status: Arc<ListenerRegistry<ConnectionStatus>>,
    /// Inbound message listeners.
    messages: Arc<ListenerRegistry<str>>,
    /// Deliveries waiting to run.
    outbox: Mutex<VecDeque<Job>>,
    /// Held by the draining thread; the flag is set while its drain loop
    /// runs, so nested flushes on the same thread can tell.
    drain: ReentrantMutex<Cell<bool>>,
}

/// Exclusive delivery rights, re-enterable by the thread that holds them.
pub(crate) type DeliveryGuard<'a> = ReentrantMutexGuard<'a, Cell<bool>>;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: ListenerRegistry::new("status"),
            messages: ListenerRegistry::new("message"),
            outbox: Mutex::new(VecDeque::new()),
            drain: ReentrantMutex::new(Cell::new(false)),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers a status listener without any initial delivery.
    pub fn subscribe_status(&self, listener: StatusListener) -> Subscription {
        let id = self.status.insert(listener);
        self.status.subscription(id)
    }

    /// Registers a message listener.
    pub fn subscribe_messages(&self, listener: MessageListener) -> Subscription {
        let id = self.messages.insert(listener);
        self.messages.subscription(id)
    }

    /// Returns the number of status listeners.
    #[must_use]
    pub fn status_listener_count(&self) -> usize {
        self.status.len()
    }

    /// Returns the number of message listeners.
    #[must_use]
    pub fn message_listener_count(&self) -> usize {
        self.messages.len()
    }

    // ========================================================================
    // Staging
    // ========================================================================

    /// Stages a status change for every current status listener.
    pub fn stage_status(&self, status: ConnectionStatus) {
        let targets = self.status.snapshot();
        self.stage(&self.status, targets, Arc::new(status));
    }

    /// Stages an inbound message for every current message listener.
    pub fn stage_message(&self, text: impl Into<Arc<str>>) {
        let targets = self.messages.snapshot();
        self.stage(&self.messages, targets, text.into());
    }

    fn stage<T>(&self, registry: &Arc<ListenerRegistry<T>>, targets: Vec<SubscriptionId>, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if targets.is_empty() {
            return;
        }
        let registry = Arc::clone(registry);
        self.outbox
            .lock()
            .push_back(Box::new(move || registry.deliver(&targets, &value)));
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Takes delivery rights, waiting for another thread's drain to finish.
    ///
    /// While the guard is held nothing else delivers, so a caller can hand a
    /// value to one listener directly without racing staged deliveries.
    pub(crate) fn delivery_guard(&self) -> DeliveryGuard<'_> {
        self.drain.lock()
    }

    /// Delivers a status to a single listener right away.
    ///
    /// Callers hold [`delivery_guard`](Self::delivery_guard) so the value
    /// cannot overtake or trail a staged transition.
    pub(crate) fn deliver_status_to(&self, id: SubscriptionId, status: ConnectionStatus) {
        self.status.deliver(&[id], &status);
    }

    /// Runs staged deliveries until the outbox is empty.
    ///
    /// Blocks while another thread is draining. Returns immediately when
    /// called from a listener on the draining thread; the outer drain picks
    /// up whatever was staged.
    pub fn flush(&self) {
        let draining = self.drain.lock();
        if draining.replace(true) {
            return;
        }

        loop {
            let job = self.outbox.lock().pop_front();
            match job {
                Some(job) => job(),
                None => break,
            }
        }

        draining.set(false);
    }

    /// Stages and immediately delivers a status change.
    pub fn publish_status(&self, status: ConnectionStatus) {
        self.stage_status(status);
        self.flush();
    }

    /// Stages and immediately delivers an inbound message.
    pub fn publish_message(&self, text: impl Into<Arc<str>>) {
        self.stage_message(text);
        self.flush();
    }
}

// ============================================================================
// Tests
// ============================================================================
