//! Listener registry with unique membership per callback.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

/// Shared listener callback.
///
/// Identity is the `Arc` allocation: registering clones of the same `Arc`
/// twice yields a single registration.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Removal side of a registry, erased so [`Subscription`] is not generic.
trait Unregister: Send + Sync {
    fn unregister(&self, id: SubscriptionId);
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// A set of listeners for one event kind.
pub struct ListenerRegistry<T: ?Sized> {
    /// Human-readable kind, used in logs.
    kind: &'static str,
    /// Registered listeners.
    listeners: Mutex<FxHashMap<SubscriptionId, Listener<T>>>,
}

impl<T: ?Sized + 'static> ListenerRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(kind: &'static str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            listeners: Mutex::new(FxHashMap::default()),
        })
    }

    /// Adds a listener and returns its registration id.
    ///
    /// Adding a listener that is already registered returns the existing id.
    pub fn insert(&self, listener: Listener<T>) -> SubscriptionId {
        let mut listeners = self.listeners.lock();

        if let Some((id, _)) = listeners
            .iter()
            .find(|(_, existing)| Arc::ptr_eq(existing, &listener))
        {
            return *id;
        }

        let id = SubscriptionId::next();
        listeners.insert(id, listener);
        id
    }

    /// Removes a registration. Unknown ids are ignored.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    /// Returns `true` if the registration is still present.
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().contains_key(&id)
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Returns current registration ids in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<_> = self.listeners.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Invokes each target that is still registered.
    ///
    /// The lock is not held while a listener runs, so listeners may
    /// subscribe or unsubscribe from inside the callback. A panicking
    /// listener is logged and does not stop delivery to the rest.
    pub fn deliver(&self, targets: &[SubscriptionId], value: &T) {
        for id in targets {
            let Some(listener) = self.listeners.lock().get(id).cloned() else {
                continue;
            };

            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                warn!(kind = self.kind, subscription = %id, "Listener panicked");
            }
        }
    }

    /// Wraps a registration id into an unsubscribe handle.
    #[must_use]
    pub fn subscription(self: &Arc<Self>, id: SubscriptionId) -> Subscription
    where
        T: Send + Sync,
    {
        let registry: Arc<dyn Unregister> = self.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Unregister for ListenerRegistry<T> {
    fn unregister(&self, id: SubscriptionId) {
        self.remove(id);
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle returned by `on_status` / `on_message`.
///
/// Dropping the handle keeps the listener registered. Call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<dyn Unregister>,
}

impl Subscription {
    /// Returns the registration id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes exactly this registration. Further calls are harmless.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
