use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{absorb, StoreError, StoreResult};
use crate::traits::SyncStorage;

const BACKEND: &str = "file";

/// Every key in one consolidated JSON file.
///
/// The file holds a single object mapping keys to record strings. Reads are
/// served from an in-memory copy loaded at construction; every write
/// rewrites the whole file through a temp file and an atomic rename, so the
/// file on disk is never half-written.
pub struct FileStorage {
    path: PathBuf,
    records: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or prepare to create) the consolidated file at `path`.
    ///
    /// The parent directory is created if needed. A file that exists but
    /// cannot be parsed is logged and treated as empty; it is replaced on
    /// the next write.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| StoreError::Unavailable {
            backend: BACKEND,
            path: path.clone(),
            reason,
        };

        if path.is_dir() {
            return Err(unavailable("path is a directory".into()));
        }
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;

        let records = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|error| {
                warn!(path = %path.display(), %error, "unreadable storage file; starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(unavailable(e.to_string())),
        };

        debug!(path = %path.display(), records = records.len(), "file storage opened");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Path of the consolidated file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, records: &BTreeMap<String, String>) -> StoreResult<()> {
        let text = serde_json::to_string_pretty(records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn try_set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut records = self.records.lock().expect("lock poisoned");
        let previous = records.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&records) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(old) => records.insert(key.to_string(), old),
                None => records.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn try_remove(&self, key: &str) -> StoreResult<()> {
        let mut records = self.records.lock().expect("lock poisoned");
        let Some(previous) = records.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush(&records) {
            records.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

impl SyncStorage for FileStorage {
    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.records.lock().expect("lock poisoned").contains_key(key))
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.records.lock().expect("lock poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        Ok(absorb(BACKEND, "set", key, self.try_set(key, value), ()))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        Ok(absorb(BACKEND, "remove", key, self.try_remove(key), ()))
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage").field("path", &self.path).finish()
    }
}
