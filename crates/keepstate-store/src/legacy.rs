use std::collections::HashSet;
use std::future::Future;
use std::panic::Location;
use std::sync::Mutex;

use tracing::warn;

use crate::error::StoreResult;
use crate::traits::Storage;

/// Storage handle exposed to consumers of a persisted store.
///
/// Implements the current method names and forwards the deprecated
/// `*_item` names to them. Each deprecated call site warns once.
pub struct LegacyStorage {
    inner: Storage,
    warned: Mutex<HashSet<(&'static str, &'static Location<'static>)>>,
}

impl LegacyStorage {
    pub fn new(inner: Storage) -> Self {
        Self {
            inner,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// The wrapped strategy.
    pub fn inner(&self) -> &Storage {
        &self.inner
    }

    pub async fn has(&self, key: &str) -> StoreResult<bool> {
        self.inner.has(key).await
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value).await
    }

    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key).await
    }

    #[deprecated(note = "use `has`")]
    #[track_caller]
    pub fn has_item<'a>(&'a self, key: &'a str) -> impl Future<Output = StoreResult<bool>> + 'a {
        self.deprecated("has_item", "has", Location::caller());
        self.has(key)
    }

    #[deprecated(note = "use `get`")]
    #[track_caller]
    pub fn get_item<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Future<Output = StoreResult<Option<String>>> + 'a {
        self.deprecated("get_item", "get", Location::caller());
        self.get(key)
    }

    #[deprecated(note = "use `set`")]
    #[track_caller]
    pub fn set_item<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> impl Future<Output = StoreResult<()>> + 'a {
        self.deprecated("set_item", "set", Location::caller());
        self.set(key, value)
    }

    #[deprecated(note = "use `remove`")]
    #[track_caller]
    pub fn remove_item<'a>(&'a self, key: &'a str) -> impl Future<Output = StoreResult<()>> + 'a {
        self.deprecated("remove_item", "remove", Location::caller());
        self.remove(key)
    }

    /// Number of distinct deprecated call sites seen so far.
    pub fn deprecated_call_sites(&self) -> usize {
        self.warned.lock().expect("lock poisoned").len()
    }

    fn deprecated(&self, old: &'static str, new: &'static str, site: &'static Location<'static>) {
        let first = self.warned.lock().expect("lock poisoned").insert((old, site));
        if first {
            warn!(
                method = old,
                replacement = new,
                file = site.file(),
                line = site.line(),
                "deprecated storage method called"
            );
        }
    }
}

impl std::fmt::Debug for LegacyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyStorage")
            .field("inner", &self.inner)
            .finish()
    }
}
