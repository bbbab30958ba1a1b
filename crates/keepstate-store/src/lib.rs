//! Storage strategies for keepstate.
//!
//! A storage strategy is a plain key/value store of strings: each persisted
//! store writes one record under its key. Strategies come in two flavors,
//! fixed at configuration time by the [`Storage`] enum:
//!
//! - [`SyncStorage`]: blocking; lets the orchestrator restore before the
//!   state is first observed
//! - [`AsyncStorage`]: awaited; restoration runs in the background
//!
//! # Storage Backends
//!
//! - [`MemoryStorage`]: volatile `HashMap` (the default)
//! - [`FileStorage`]: every key in one consolidated JSON file
//! - [`DirectoryStorage`]: one file per key
//! - `RedbStorage`: embedded record database, table created lazily (`redb` feature)
//! - `SqliteStorage`: relational table created lazily (`sqlite` feature)
//!
//! # Design Rules
//!
//! 1. A missing key reads as `None`; it is never an error.
//! 2. Writes overwrite; there is at most one record per (backend, key).
//! 3. Built-in adapters absorb runtime failures at their boundary, log
//!    them, and report the absent result.
//! 4. Construction fails loudly when the backend cannot be used at all.

pub mod config;
pub mod directory;
#[cfg(feature = "redb")]
pub mod embedded;
pub mod error;
pub mod file;
pub mod legacy;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::StorageConfig;
pub use directory::DirectoryStorage;
#[cfg(feature = "redb")]
pub use embedded::RedbStorage;
pub use error::{absorb, StoreError, StoreResult};
pub use file::FileStorage;
pub use legacy::LegacyStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
pub use traits::{AsyncStorage, Storage, SyncStorage};
