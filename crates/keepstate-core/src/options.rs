use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use keepstate_codec::{JsonEnvelopeSerializer, Serialization};
use keepstate_merge::{MergeStrategy, ReplaceMerge, ShallowMerge};
use keepstate_store::{MemoryStorage, Storage, StorageConfig};
use keepstate_types::Value;

use crate::error::KeepResult;

/// Default quiet period before an automatic write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Decides whether the transition `(previous, next)` is worth writing.
pub type PersistGate<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

fn always<T>(_previous: &T, _next: &T) -> bool {
    true
}

type Factory<S> = Box<dyn FnOnce() -> KeepResult<S> + Send>;

/// A strategy given either ready-made or as a constructor run once at
/// setup.
pub enum StrategySource<S> {
    Instance(S),
    Factory(Factory<S>),
}

impl<S> StrategySource<S> {
    pub fn factory(build: impl FnOnce() -> KeepResult<S> + Send + 'static) -> Self {
        StrategySource::Factory(Box::new(build))
    }

    /// Produce the strategy. Factory errors are setup errors.
    pub fn resolve(self) -> KeepResult<S> {
        match self {
            StrategySource::Instance(strategy) => Ok(strategy),
            StrategySource::Factory(build) => build(),
        }
    }
}

impl<S> From<S> for StrategySource<S> {
    fn from(strategy: S) -> Self {
        StrategySource::Instance(strategy)
    }
}

impl<S> fmt::Debug for StrategySource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategySource::Instance(_) => f.write_str("Instance"),
            StrategySource::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Configuration for [`persist`](crate::persist).
///
/// `PersistOptions::<Value>::default()` gives an in-memory backend, the
/// envelope JSON codec, [`ShallowMerge`], a gate that always passes, a
/// 100 ms debounce, and restore on startup. For other state types start
/// from [`PersistOptions::typed`].
pub struct PersistOptions<T> {
    pub(crate) storage: StrategySource<Storage>,
    pub(crate) serializer: StrategySource<Serialization<T>>,
    pub(crate) merge: StrategySource<Arc<dyn MergeStrategy<T>>>,
    pub(crate) should_persist: PersistGate<T>,
    pub(crate) debounce: Duration,
    pub(crate) restore_on_init: bool,
}

impl<T: Clone + Send + Sync + 'static> PersistOptions<T> {
    /// Options for a state type with its own serializer. Merging replaces
    /// the default with the restored state wholesale.
    pub fn typed(serializer: Serialization<T>) -> Self {
        Self {
            storage: StrategySource::Instance(Storage::sync(MemoryStorage::new())),
            serializer: StrategySource::Instance(serializer),
            merge: StrategySource::Instance(Arc::new(ReplaceMerge)),
            should_persist: Arc::new(always::<T>),
            debounce: DEFAULT_DEBOUNCE,
            restore_on_init: true,
        }
    }
}

impl<T> PersistOptions<T> {
    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = StrategySource::Instance(storage);
        self
    }

    /// Build the backend at setup time.
    pub fn storage_with(mut self, build: impl FnOnce() -> KeepResult<Storage> + Send + 'static) -> Self {
        self.storage = StrategySource::factory(build);
        self
    }

    /// Build the backend from a file-driven configuration.
    pub fn storage_config(self, config: StorageConfig) -> Self {
        self.storage_with(move || Ok(config.build()?))
    }

    pub fn serializer(mut self, serializer: Serialization<T>) -> Self {
        self.serializer = StrategySource::Instance(serializer);
        self
    }

    pub fn serializer_with(
        mut self,
        build: impl FnOnce() -> KeepResult<Serialization<T>> + Send + 'static,
    ) -> Self {
        self.serializer = StrategySource::factory(build);
        self
    }

    pub fn merge(mut self, merge: impl MergeStrategy<T> + 'static) -> Self {
        self.merge = StrategySource::Instance(Arc::new(merge));
        self
    }

    pub fn merge_with(
        mut self,
        build: impl FnOnce() -> KeepResult<Arc<dyn MergeStrategy<T>>> + Send + 'static,
    ) -> Self {
        self.merge = StrategySource::factory(build);
        self
    }

    pub fn should_persist(mut self, gate: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        self.should_persist = Arc::new(gate);
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn restore_on_init(mut self, restore: bool) -> Self {
        self.restore_on_init = restore;
        self
    }
}

impl Default for PersistOptions<Value> {
    fn default() -> Self {
        Self {
            storage: StrategySource::Instance(Storage::sync(MemoryStorage::new())),
            serializer: StrategySource::Instance(Serialization::sync(JsonEnvelopeSerializer::new())),
            merge: StrategySource::Instance(Arc::new(ShallowMerge::default())),
            should_persist: Arc::new(always::<Value>),
            debounce: DEFAULT_DEBOUNCE,
            restore_on_init: true,
        }
    }
}

impl<T> fmt::Debug for PersistOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("storage", &self.storage)
            .field("serializer", &self.serializer)
            .field("merge", &self.merge)
            .field("debounce", &self.debounce)
            .field("restore_on_init", &self.restore_on_init)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeepError;
    use keepstate_merge::DeepMerge;

    #[test]
    fn defaults() {
        let options = PersistOptions::<Value>::default();
        assert_eq!(options.debounce, Duration::from_millis(100));
        assert!(options.restore_on_init);
        assert!((options.should_persist)(&Value::Null, &Value::from(1)));

        let storage = options.storage.resolve().unwrap();
        assert_eq!(storage.backend_name(), "memory");
        assert!(options.serializer.resolve().unwrap().is_sync());
    }

    #[test]
    fn builder_overrides() {
        let options = PersistOptions::<Value>::default()
            .debounce(Duration::from_millis(5))
            .restore_on_init(false)
            .merge(DeepMerge)
            .should_persist(|prev, next| prev != next);

        assert_eq!(options.debounce, Duration::from_millis(5));
        assert!(!options.restore_on_init);
        assert!(!(options.should_persist)(&Value::from(1), &Value::from(1)));

        let merge = options.merge.resolve().unwrap();
        let merged = merge
            .merge(
                &Value::object([("x", Value::object([("a", 1), ("b", 2)]))]),
                &Value::object([("x", Value::object([("b", 3)]))]),
            )
            .unwrap();
        assert_eq!(merged, Value::object([("x", Value::object([("a", 1), ("b", 3)]))]));
    }

    #[test]
    fn factories_resolve_once() {
        let options = PersistOptions::<Value>::default()
            .storage_with(|| Ok(Storage::sync(MemoryStorage::new())));
        assert!(matches!(options.storage, StrategySource::Factory(_)));
        assert!(options.storage.resolve().unwrap().is_sync());
    }

    #[test]
    fn factory_errors_surface() {
        let source: StrategySource<Storage> =
            StrategySource::factory(|| Err(KeepError::Config("no backend".into())));
        assert!(matches!(source.resolve(), Err(KeepError::Config(_))));
    }

    #[test]
    fn storage_from_config() {
        let options = PersistOptions::<Value>::default().storage_config(StorageConfig::Memory);
        assert_eq!(options.storage.resolve().unwrap().backend_name(), "memory");
    }

    #[test]
    fn typed_defaults_replace() {
        let options = PersistOptions::<Vec<i32>>::typed(Serialization::sync(
            keepstate_codec::SerdeJsonSerializer::new(),
        ));
        let merge = options.merge.resolve().unwrap();
        assert_eq!(merge.merge(&vec![1], &vec![2, 3]).unwrap(), vec![2, 3]);
    }
}
