//! Notifier Implementation
//!
//! A `Notifier<E>` is the change bus a bridge listens to. The external
//! layer (a key-value store, a persistence context, a history tracker)
//! emits events; bridges subscribe and filter them down to their own
//! subject.
//!
//! # Delivery
//!
//! Delivery is synchronous: `emit` returns after every listener ran.
//! The listener list is snapshotted under the lock and the lock is
//! released before any callback runs, so a listener may subscribe or
//! unsubscribe (or drop a bridge) while an event is being delivered.
//!
//! - A listener removed during emission still sees the current event.
//! - A listener added during emission only sees later events.
//!
//! # Teardown
//!
//! `subscribe` hands back a [`Subscription`]. Dropping it detaches the
//! listener, so a bridge that owns its subscription stops receiving events
//! the moment it is dropped.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::subscriber::SubscriberId;

/// Listener callback stored by a notifier.
pub type Listener<E> = dyn Fn(&E) + Send + Sync;

/// Type-erased detach operation, so a [`Subscription`] need not be generic.
trait Detach: Send + Sync {
    fn detach(&self, id: SubscriberId);
}

/// Synchronous typed publish/subscribe channel.
pub struct Notifier<E> {
    listeners: Mutex<Vec<(SubscriberId, Arc<Listener<E>>)>>,
}

impl<E: 'static> Notifier<E> {
    /// Create a notifier with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Create a shared notifier.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a listener.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or cancelled.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.listeners.lock().push((id, Arc::new(listener)));

        let notifier: Weak<dyn Detach> = Arc::downgrade(self) as Weak<dyn Detach>;
        Subscription {
            id,
            notifier: Some(notifier),
        }
    }

    /// Remove a listener by ID.
    ///
    /// Does nothing if the ID is not registered.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Deliver an event to every registered listener.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Arc<Listener<E>>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, listener)| Arc::clone(listener)).collect()
        };

        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<E: 'static> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Detach for Notifier<E> {
    fn detach(&self, id: SubscriberId) {
        self.unsubscribe(id);
    }
}

impl<E> Debug for Notifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listener_count", &self.listeners.lock().len())
            .finish()
    }
}

/// Handle to a registered listener.
///
/// Dropping this handle detaches the listener from its notifier. If the
/// notifier is already gone, dropping is a no-op.
#[must_use = "dropping a Subscription detaches the listener immediately"]
pub struct Subscription {
    id: SubscriberId,
    notifier: Option<Weak<dyn Detach>>,
}

impl Subscription {
    /// The listener's ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Detach the listener now.
    pub fn cancel(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(notifier) = self.notifier.take().and_then(|weak| weak.upgrade()) {
            notifier.detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.notifier.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
