//! Embedded indexed-record database backend (`redb` feature).

use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition, TableError};
use tracing::debug;

use crate::error::{absorb, StoreError, StoreResult};
use crate::traits::SyncStorage;

const BACKEND: &str = "redb";

/// Default table name for persisted records.
pub const DEFAULT_TABLE: &str = "keepstate";

/// Records kept in one table of a `redb` database file.
///
/// The table is not created up front. Reads against a database that has
/// never been written see every key as absent; the first write creates the
/// table. Creation is idempotent, so several stores can share one file.
pub struct RedbStorage {
    db: Database,
    path: PathBuf,
    table: String,
}

impl RedbStorage {
    /// Open or create the database at `path`, using [`DEFAULT_TABLE`].
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_table(path, DEFAULT_TABLE)
    }

    /// Open or create the database at `path`, storing records in `table`.
    pub fn open_table(path: impl AsRef<Path>, table: impl Into<String>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let table = table.into();
        if table.is_empty() {
            return Err(StoreError::Config("redb table name must not be empty".into()));
        }
        let db = Database::create(&path).map_err(|e| StoreError::Unavailable {
            backend: BACKEND,
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), %table, "redb storage opened");
        Ok(Self { db, path, table })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn definition(&self) -> TableDefinition<'_, &'static str, &'static str> {
        TableDefinition::new(&self.table)
    }

    fn try_get(&self, key: &str) -> Result<Option<String>, redb::Error> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(self.definition()) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = table.get(key)?.map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn try_set(&self, key: &str, value: &str) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(self.definition())?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn try_remove(&self, key: &str) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(self.definition())?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }
}

fn lift<T>(result: Result<T, redb::Error>) -> StoreResult<T> {
    result.map_err(|e| StoreError::backend(BACKEND, e))
}

impl SyncStorage for RedbStorage {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(absorb(BACKEND, "get", key, lift(self.try_get(key)), None))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        Ok(absorb(BACKEND, "set", key, lift(self.try_set(key, value)), ()))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        Ok(absorb(BACKEND, "remove", key, lift(self.try_remove(key)), ()))
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage")
            .field("path", &self.path)
            .field("table", &self.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_before_first_write_are_absent() {
        let dir = TempDir::new().unwrap();
        let store = RedbStorage::open(dir.path().join("state.redb")).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert!(!store.has("k").unwrap());
        store.remove("k").unwrap();
    }

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let store = RedbStorage::open(dir.path().join("state.redb")).unwrap();
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");
        {
            let store = RedbStorage::open_table(&path, "prefs").unwrap();
            store.set("theme", "dark").unwrap();
        }
        let store = RedbStorage::open_table(&path, "prefs").unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn empty_table_name_rejected() {
        let dir = TempDir::new().unwrap();
        let err = RedbStorage::open_table(dir.path().join("x.redb"), "").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
