//! The persistence orchestrator.
//!
//! [`persist`] wires an observable [`Store`] to a storage backend:
//!
//! 1. Resolve the configured strategies.
//! 2. Restore on startup. With a sync backend and a sync codec the record is
//!    read and merged before the store exists, so the first state anyone sees
//!    is already restored. Otherwise the store starts from the default and a
//!    background task restores it in place.
//! 3. Subscribe. Every mutation updates the "previous" snapshot, asks the
//!    gate whether the transition should be written, and if so restarts the
//!    queue's debounce timer.
//!
//! Writes never start before the startup restore has settled, so a write
//! cannot clobber a record that has not been read yet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use keepstate_codec::Serialization;
use keepstate_merge::{diff_values, MergeStrategy, ValueDiff};
use keepstate_store::{LegacyStorage, Storage};
use keepstate_types::{Snapshot, StoreKey, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::KeepResult;
use crate::observe::{Store, Subscription};
use crate::options::{PersistGate, PersistOptions};
use crate::queue::{PersistQueue, QueueStats, WriteJob};

/// Make `initial` persistent under `key`.
///
/// Fails only on setup problems: an empty key, a strategy factory that
/// errors, or no tokio runtime. Backend and codec failures after that point
/// are logged and never returned.
pub async fn persist<T>(
    initial: T,
    key: impl Into<String>,
    options: PersistOptions<T>,
) -> KeepResult<Persisted<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let key = StoreKey::new(key)?;
    let PersistOptions {
        storage,
        serializer,
        merge,
        should_persist,
        debounce,
        restore_on_init,
    } = options;
    let storage = storage.resolve()?;
    let serializer = serializer.resolve()?;
    let merge = merge.resolve()?;
    let queue = PersistQueue::new(key.as_str(), debounce)?;

    let sync_restore = restore_on_init && storage.is_sync() && serializer.is_sync();
    let mut starting = initial.clone();
    if sync_restore {
        if let Some(restored) = read_sync(&key, &storage, &serializer) {
            match merge.merge(&initial, &restored) {
                Ok(merged) => {
                    info!(key = %key, "state restored");
                    starting = merged;
                }
                Err(e) => warn!(key = %key, error = %e, "restored state could not be merged"),
            }
        }
    }

    let background = restore_on_init && !sync_restore;
    let (ready_tx, ready) = watch::channel(!background);
    let store = Store::new(starting);

    let orchestrator = Arc::new(Orchestrator {
        key: key.clone(),
        storage: storage.clone(),
        serializer,
        merge,
        gate: should_persist,
        initial,
        transition: Mutex::new(Transition::settled(store.snapshot())),
        store: store.clone(),
        queue,
        ready,
        applying: AtomicBool::new(false),
    });

    let weak: Weak<Orchestrator<T>> = Arc::downgrade(&orchestrator);
    let subscription = store.subscribe(move || {
        if let Some(orchestrator) = weak.upgrade() {
            orchestrator.on_change();
        }
    });

    if background {
        let task = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            task.restore_on_start().await;
            let _ = ready_tx.send(true);
        });
    }

    debug!(
        key = %key,
        backend = storage.backend_name(),
        sync_restore,
        background_restore = background,
        "store persisted"
    );

    Ok(Persisted {
        store,
        storage: LegacyStorage::new(storage),
        orchestrator,
        _subscription: subscription,
    })
}

fn read_sync<T>(key: &StoreKey, storage: &Storage, serializer: &Serialization<T>) -> Option<T>
where
    T: Send + Sync,
{
    let (storage, serializer) = (storage.as_sync()?, serializer.as_sync()?);
    let text = match storage.get(key.as_str()) {
        Ok(text) => text?,
        Err(e) => {
            warn!(key = %key, error = %e, "could not read stored state");
            return None;
        }
    };
    match serializer.deserialize(&text) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(key = %key, error = %e, "stored state could not be decoded");
            None
        }
    }
}

/// The last observed mutation as a `(before, after)` pair.
struct Transition<T> {
    before: Snapshot<T>,
    after: Snapshot<T>,
}

impl<T> Transition<T> {
    fn settled(state: Snapshot<T>) -> Self {
        Self {
            before: state.clone(),
            after: state,
        }
    }

    /// Record `next` as the newest state and return the one it replaces.
    fn advance(&mut self, next: Snapshot<T>) -> Snapshot<T> {
        let replaced = std::mem::replace(&mut self.after, next);
        self.before = replaced.clone();
        replaced
    }
}

struct Orchestrator<T> {
    key: StoreKey,
    storage: Storage,
    serializer: Serialization<T>,
    merge: Arc<dyn MergeStrategy<T>>,
    gate: PersistGate<T>,
    initial: T,
    transition: Mutex<Transition<T>>,
    store: Store<T>,
    queue: PersistQueue,
    ready: watch::Receiver<bool>,
    applying: AtomicBool,
}

impl<T> Orchestrator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn on_change(self: &Arc<Self>) {
        let next = self.store.snapshot();
        let previous = self
            .transition
            .lock()
            .expect("lock poisoned")
            .advance(next.clone());
        if self.applying.load(Ordering::SeqCst) {
            return;
        }
        if !(self.gate)(&previous, &next) {
            if self.queue.cancel_pending() {
                debug!(key = %self.key, "gate rejected change, pending write dropped");
            }
            return;
        }
        let orchestrator = Arc::clone(self);
        self.queue.schedule(move || {
            let latest = orchestrator.store.snapshot();
            orchestrator.write_job(latest)
        });
    }

    fn write_job(self: Arc<Self>, snapshot: Snapshot<T>) -> WriteJob {
        Box::pin(async move {
            let settled = *self.ready.borrow();
            let snapshot = if settled {
                snapshot
            } else {
                self.wait_ready().await;
                self.store.snapshot()
            };
            let text = self.serializer.serialize(&snapshot).await?;
            self.storage.set(self.key.as_str(), &text).await?;
            debug!(key = %self.key, bytes = text.len(), "state written");
            Ok(())
        })
    }

    async fn wait_ready(&self) {
        let mut ready = self.ready.clone();
        if ready.wait_for(|ready| *ready).await.is_err() {
            debug!(key = %self.key, "restore task ended without signalling");
        }
    }

    async fn read(&self) -> Option<T> {
        let text = match self.storage.get(self.key.as_str()).await {
            Ok(text) => text?,
            Err(e) => {
                warn!(key = %self.key, error = %e, "could not read stored state");
                return None;
            }
        };
        match self.serializer.deserialize(&text).await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored state could not be decoded");
                None
            }
        }
    }

    /// Merge `restored` over `base` and install the result without
    /// scheduling a write for it.
    fn apply(&self, base: &T, restored: &T) -> bool {
        match self.merge.merge(base, restored) {
            Ok(merged) => {
                self.applying.store(true, Ordering::SeqCst);
                self.store.replace(merged);
                self.applying.store(false, Ordering::SeqCst);
                true
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "restored state could not be merged");
                false
            }
        }
    }

    /// Background startup restore. Changes made before it completes keep
    /// any key the stored record does not override.
    async fn restore_on_start(&self) {
        let Some(restored) = self.read().await else {
            debug!(key = %self.key, "nothing to restore");
            return;
        };
        let live = self.store.snapshot();
        if self.apply(&live, &restored) {
            info!(key = %self.key, "state restored");
        }
    }

    async fn restore(&self) -> bool {
        let Some(restored) = self.read().await else {
            return false;
        };
        let applied = self.apply(&self.initial, &restored);
        if applied {
            info!(key = %self.key, "state restored");
        }
        applied
    }
}

/// A store wired to a backend. Dropping it stops automatic persistence.
pub struct Persisted<T> {
    store: Store<T>,
    storage: LegacyStorage,
    orchestrator: Arc<Orchestrator<T>>,
    _subscription: Subscription,
}

impl<T> Persisted<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The live store. Mutations through it are persisted automatically.
    pub fn store(&self) -> &Store<T> {
        &self.store
    }

    pub fn key(&self) -> &StoreKey {
        &self.orchestrator.key
    }

    /// Write the current state now, bypassing the debounce.
    ///
    /// The gate is consulted with the last observed transition, the state
    /// before the latest mutation against the current one. Before any
    /// mutation both sides are the starting state. If the gate rejects,
    /// nothing is written. Resolves once the write has run, whether or not
    /// the backend accepted it.
    pub async fn persist(&self) {
        let current = self.store.snapshot();
        let previous = self
            .orchestrator
            .transition
            .lock()
            .expect("lock poisoned")
            .before
            .clone();
        if !(self.orchestrator.gate)(&previous, &current) {
            debug!(key = %self.orchestrator.key, "gate rejected manual write");
            return;
        }
        let job = Arc::clone(&self.orchestrator).write_job(current);
        self.orchestrator.queue.submit(job).wait().await;
    }

    /// Read the stored record, merge it over the original default state, and
    /// install the result. Returns `false` if there was no usable record, in
    /// which case the live state is untouched.
    pub async fn restore(&self) -> bool {
        self.orchestrator.restore().await
    }

    /// Remove the stored record. The live state is kept; a pending
    /// automatic write is dropped so it cannot recreate the record.
    pub async fn clear(&self) {
        self.orchestrator.queue.cancel_pending();
        self.orchestrator.queue.flush().await;
        if let Err(e) = self.orchestrator.storage.remove(self.orchestrator.key.as_str()).await {
            warn!(key = %self.orchestrator.key, error = %e, "could not remove stored state");
        }
    }

    /// The backend, including the deprecated method names.
    pub fn storage(&self) -> &LegacyStorage {
        &self.storage
    }

    /// Wait until every scheduled write has run.
    pub async fn flush(&self) {
        self.orchestrator.queue.flush().await;
    }

    /// Wait for the startup restore to settle.
    pub async fn ready(&self) {
        self.orchestrator.wait_ready().await;
    }

    pub fn debounce(&self) -> Duration {
        self.orchestrator.queue.debounce()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.orchestrator.queue.stats()
    }
}

impl Persisted<Value> {
    /// What the live state would change in the stored record.
    ///
    /// A missing or unreadable record compares as an empty object.
    pub async fn unsaved_changes(&self) -> ValueDiff {
        let stored = self
            .orchestrator
            .read()
            .await
            .unwrap_or_else(|| Value::object(Vec::<(String, Value)>::new()));
        diff_values(&stored, &self.store.snapshot())
    }
}

impl<T> std::fmt::Debug for Persisted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persisted")
            .field("key", &self.orchestrator.key)
            .field("storage", &self.orchestrator.storage)
            .field("queue", &self.orchestrator.queue)
            .finish()
    }
}
