use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Blocking key/value storage for persisted records.
///
/// All implementations must satisfy these invariants:
/// - `get` of a missing key is `Ok(None)`, never an error.
/// - `set` overwrites any prior record at the key (last write wins).
/// - `remove` of a missing key is a no-op.
/// - Concurrent calls need not be safe against each other: the persist
///   queue never has two writes in flight for one store.
pub trait SyncStorage: Send + Sync {
    /// Check whether a record exists.
    ///
    /// Default implementation derives existence from `get()`.
    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Read the record stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` under `key`, replacing any prior record.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete the record under `key`.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str {
        "custom"
    }
}

/// Non-blocking key/value storage for persisted records.
///
/// Same contract as [`SyncStorage`], with every operation awaited.
#[async_trait]
pub trait AsyncStorage: Send + Sync {
    async fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str {
        "custom"
    }
}

/// A storage strategy, tagged with how it can be driven.
///
/// The variant is fixed when the strategy is configured. A `Sync` backend
/// lets the orchestrator restore state before the store is first observed;
/// an `Async` backend restores in the background.
#[derive(Clone)]
pub enum Storage {
    Sync(Arc<dyn SyncStorage>),
    Async(Arc<dyn AsyncStorage>),
}

impl Storage {
    /// Wrap a blocking backend.
    pub fn sync(backend: impl SyncStorage + 'static) -> Self {
        Storage::Sync(Arc::new(backend))
    }

    /// Wrap a non-blocking backend.
    pub fn asynchronous(backend: impl AsyncStorage + 'static) -> Self {
        Storage::Async(Arc::new(backend))
    }

    /// Returns `true` if reads can complete without awaiting.
    pub fn is_sync(&self) -> bool {
        matches!(self, Storage::Sync(_))
    }

    /// The blocking backend, when there is one.
    pub fn as_sync(&self) -> Option<&Arc<dyn SyncStorage>> {
        match self {
            Storage::Sync(backend) => Some(backend),
            Storage::Async(_) => None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::Sync(backend) => backend.backend_name(),
            Storage::Async(backend) => backend.backend_name(),
        }
    }

    pub async fn has(&self, key: &str) -> StoreResult<bool> {
        match self {
            Storage::Sync(backend) => backend.has(key),
            Storage::Async(backend) => backend.has(key).await,
        }
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            Storage::Sync(backend) => backend.get(key),
            Storage::Async(backend) => backend.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        match self {
            Storage::Sync(backend) => backend.set(key, value),
            Storage::Async(backend) => backend.set(key, value).await,
        }
    }

    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        match self {
            Storage::Sync(backend) => backend.remove(key),
            Storage::Async(backend) => backend.remove(key).await,
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_sync() { "sync" } else { "async" };
        f.debug_struct("Storage")
            .field("backend", &self.backend_name())
            .field("mode", &mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Async backend with no `has` override, to exercise the default.
    struct AsyncMap(Mutex<HashMap<String, String>>);

    #[async_trait]
    impl AsyncStorage for AsyncMap {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.0.lock().unwrap().insert(key.into(), value.into());
            Ok(())
        }

        async fn remove(&self, key: &str) -> StoreResult<()> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn sync_variant_dispatch() {
        let storage = Storage::sync(MemoryStorage::new());
        assert!(storage.is_sync());
        assert!(storage.as_sync().is_some());
        storage.set("k", "v").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(storage.has("k").await.unwrap());
        storage.remove("k").await.unwrap();
        assert!(!storage.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn async_variant_derives_has_from_get() {
        let storage = Storage::asynchronous(AsyncMap(Mutex::new(HashMap::new())));
        assert!(!storage.is_sync());
        assert_eq!(storage.backend_name(), "custom");
        assert!(!storage.has("k").await.unwrap());
        storage.set("k", "v").await.unwrap();
        assert!(storage.has("k").await.unwrap());
    }

    #[test]
    fn debug_names_mode() {
        let storage = Storage::sync(MemoryStorage::new());
        let rendered = format!("{:?}", storage);
        assert!(rendered.contains("memory"));
        assert!(rendered.contains("sync"));
    }
}
