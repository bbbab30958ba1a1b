//! Relational table backend (`sqlite` feature).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{absorb, StoreError, StoreResult};
use crate::traits::SyncStorage;

const BACKEND: &str = "sqlite";

/// Default table name for persisted records.
pub const DEFAULT_TABLE: &str = "keepstate";

/// Records kept as rows of a `(key TEXT PRIMARY KEY, value TEXT)` table.
///
/// The table is created on first use with `CREATE TABLE IF NOT EXISTS`.
/// Writes use `INSERT OR REPLACE`, so a key maps to at most one row.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    path: PathBuf,
    table: String,
    ready: Mutex<bool>,
}

impl SqliteStorage {
    /// Open or create the database at `path`, using [`DEFAULT_TABLE`].
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_table(path, DEFAULT_TABLE)
    }

    /// Open or create the database at `path`, storing records in `table`.
    ///
    /// `table` is spliced into SQL, so it must be a plain identifier.
    pub fn open_table(path: impl AsRef<Path>, table: impl Into<String>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let table = table.into();
        validate_table_name(&table)?;
        let conn = Connection::open(&path).map_err(|e| StoreError::Unavailable {
            backend: BACKEND,
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), %table, "sqlite storage opened");
        Ok(Self::from_parts(conn, path, table))
    }

    /// Use an existing connection.
    pub fn with_connection(conn: Connection, table: impl Into<String>) -> StoreResult<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        let path = conn.path().map(PathBuf::from).unwrap_or_default();
        Ok(Self::from_parts(conn, path, table))
    }

    fn from_parts(conn: Connection, path: PathBuf, table: String) -> Self {
        Self {
            conn: Mutex::new(conn),
            path,
            table,
            ready: Mutex::new(false),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn ensure_table(&self, conn: &Connection) -> rusqlite::Result<()> {
        let mut ready = self.ready.lock().expect("lock poisoned");
        if !*ready {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY, value TEXT)",
                self.table
            ))?;
            *ready = true;
        }
        Ok(())
    }

    fn try_get(&self, key: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.conn.lock().expect("lock poisoned");
        self.ensure_table(&conn)?;
        conn.query_row(
            &format!("SELECT value FROM {} WHERE key = ?1", self.table),
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    fn try_set(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("lock poisoned");
        self.ensure_table(&conn)?;
        conn.execute(
            &format!("INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)", self.table),
            params![key, value],
        )?;
        Ok(())
    }

    fn try_remove(&self, key: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("lock poisoned");
        self.ensure_table(&conn)?;
        conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", self.table),
            params![key],
        )?;
        Ok(())
    }
}

fn validate_table_name(table: &str) -> StoreResult<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "sqlite table name {table:?} is not a plain identifier"
        )))
    }
}

fn lift<T>(result: rusqlite::Result<T>) -> StoreResult<T> {
    result.map_err(|e| StoreError::backend(BACKEND, e))
}

impl SyncStorage for SqliteStorage {
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

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("path", &self.path)
            .field("table", &self.table)
            .finish()
    }
}
