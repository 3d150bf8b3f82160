//! State-change notifications.
//!
//! Listeners are plain callbacks that receive the event together with the
//! visible value after the change, so they never need to reach back into
//! the session that is notifying them. Notification runs against a copy of
//! the listener list taken under the lock, so a callback may subscribe or
//! unsubscribe (itself or others) without deadlocking; such changes take
//! effect from the next notification.

use peerseq_crdt::VectorClock;
use peerseq_types::ReplicaId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Why the state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCause {
    /// A local mutation.
    Local,
    /// Operations from a remote replica (and whatever they released).
    Remote(ReplicaId),
    /// A state snapshot from a remote replica.
    Snapshot(ReplicaId),
}

/// Delivered to listeners after each change.
#[derive(Debug, Clone)]
pub struct StateChanged {
    /// Monotonic change counter of the session.
    pub version: u64,
    /// Visible length after the change.
    pub len: usize,
    /// Local vector clock after the change.
    pub clock: VectorClock,
    /// What caused the change.
    pub cause: ChangeCause,
}

type Listener<T> = Arc<dyn Fn(&StateChanged, &[T]) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    // A panicking listener never runs under the lock, so the list is intact.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a [`Subscription`] needs from the registry, whatever the element type.
trait Membership: Send + Sync {
    fn remove(&self, id: u64);
    fn contains(&self, id: u64) -> bool;
}

impl<T> Membership for Mutex<Registry<T>> {
    fn remove(&self, id: u64) {
        lock(self).listeners.retain(|(listener, _)| *listener != id);
    }

    fn contains(&self, id: u64) -> bool {
        lock(self).listeners.iter().any(|(listener, _)| *listener == id)
    }
}

/// A set of listeners for a sequence of `T`. Cloning shares the set.
pub struct Observers<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Observers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<T> Observers<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. It stays registered until the returned
    /// handle is dropped or unsubscribed.
    ///
    /// The listener receives the event and the visible value after the
    /// change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChanged, &[T]) + Send + Sync + 'static,
        T: 'static,
    {
        let listener: Listener<T> = Arc::new(listener);
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, listener));
        drop(registry);

        let weak = Arc::downgrade(&self.registry);
        let weak: Weak<dyn Membership> = weak;
        Subscription {
            id,
            registry: Some(weak),
        }
    }

    /// Calls every listener registered at the time of the call.
    pub fn notify(&self, event: &StateChanged, value: &[T]) {
        let listeners: Vec<Listener<T>> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event, value);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    /// Returns true if nobody listens.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn Membership>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Unsubscribes now.
    pub fn unsubscribe(self) {}

    /// Keeps the listener registered for the lifetime of the observer set.
    pub fn detach(mut self) {
        self.registry = None;
    }

    /// Returns true while the listener is registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|registry| registry.contains(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.as_ref().and_then(Weak::upgrade) {
            registry.remove(self.id);
        }
    }
}
