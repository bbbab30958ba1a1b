//! Minimal observable state container.
//!
//! [`Store`] holds the live state behind an immutable [`Snapshot`]. Every
//! mutation installs a fresh snapshot and then calls each subscriber, in
//! registration order, on the mutating thread. Handles are cheap clones of
//! the same container, so a handle taken before a restore still sees the
//! restored state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use keepstate_types::Snapshot;

type Listener = Arc<dyn Fn() + Send + Sync>;
type Listeners = Mutex<Vec<(u64, Listener)>>;

/// Observable state handle.
pub struct Store<T> {
    state: Arc<RwLock<Snapshot<T>>>,
    listeners: Arc<Listeners>,
    next_id: Arc<AtomicU64>,
}

impl<T> Store<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(Snapshot::new(state))),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The current state. Later mutations never affect a returned snapshot.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.state.read().expect("lock poisoned").clone()
    }

    /// Swap in a whole new state and notify subscribers.
    pub fn replace(&self, state: T) {
        *self.state.write().expect("lock poisoned") = Snapshot::new(state);
        self.notify();
    }

    /// Register a callback run after every mutation.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("lock poisoned")
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().expect("lock poisoned").len()
    }

    fn notify(&self) {
        // Listeners may subscribe or unsubscribe, so run them unlocked.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl<T: Clone> Store<T> {
    /// Mutate a copy of the current state, install it, notify subscribers.
    pub fn update(&self, mutate: impl FnOnce(&mut T)) {
        {
            let mut guard = self.state.write().expect("lock poisoned");
            let mut next = guard.to_owned_state();
            mutate(&mut next);
            *guard = Snapshot::new(next);
        }
        self.notify();
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            listeners: Arc::clone(&self.listeners),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.snapshot())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .expect("lock poisoned")
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
