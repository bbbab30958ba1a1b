//! Persist an observable state tree to a pluggable backend.
//!
//! ```no_run
//! use keepstate_core::{persist, PersistOptions, Value};
//!
//! # async fn demo() -> keepstate_core::KeepResult<()> {
//! let settings = persist(
//!     Value::object([("theme", "light")]),
//!     "settings",
//!     PersistOptions::default(),
//! )
//! .await?;
//!
//! settings.store().update(|s| {
//!     s.insert("theme", "dark");
//! });
//! settings.flush().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`observe`]: the observable [`Store`] and its subscriptions
//! - [`queue`]: debounced, single-flight [`PersistQueue`]
//! - [`options`]: [`PersistOptions`] and strategy resolution
//! - [`persist`](mod@persist): the orchestrator and its [`Persisted`] handle

pub mod error;
pub mod observe;
pub mod options;
pub mod persist;
pub mod queue;

pub use error::{KeepError, KeepResult};
pub use observe::{Store, Subscription};
pub use options::{PersistGate, PersistOptions, StrategySource, DEFAULT_DEBOUNCE};
pub use persist::{persist, Persisted};
pub use queue::{Completion, PersistQueue, QueueStats, WriteJob};

// Re-export the strategy crates and the types most callers need.
pub use keepstate_codec as codec;
pub use keepstate_merge as merge;
pub use keepstate_store as store;
pub use keepstate_types as types;

pub use keepstate_codec::{JsonEnvelopeSerializer, Serialization};
pub use keepstate_merge::{DeepMerge, MergeStrategy, ReplaceMerge, ShallowMerge};
pub use keepstate_store::{LegacyStorage, Storage, StorageConfig};
pub use keepstate_types::{Snapshot, StoreKey, Value};
