use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{absorb, StoreError, StoreResult};
use crate::traits::AsyncStorage;

const BACKEND: &str = "directory";
const EXTENSION: &str = "json";

/// One file per key under a root directory.
///
/// Keys are escaped into file names: ASCII letters, digits, `-` and `_` are
/// kept, every other byte becomes `%XX`. Writes go to a sibling temp file
/// that is then renamed over the record.
#[derive(Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    /// Use `root` as the record directory, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::Unavailable {
            backend: BACKEND,
            path: root.clone(),
            reason: e.to_string(),
        })?;
        if !root.is_dir() {
            return Err(StoreError::Unavailable {
                backend: BACKEND,
                path: root,
                reason: "not a directory".into(),
            });
        }
        debug!(root = %root.display(), "directory storage opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the record for `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", escape_key(key), EXTENSION))
    }

    async fn try_get(&self, key: &str) -> StoreResult<Option<String>> {
        match tokio::fs::read_to_string(self.record_path(key)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn try_set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.record_path(key);
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn try_remove(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AsyncStorage for DirectoryStorage {
    async fn has(&self, key: &str) -> StoreResult<bool> {
        let exists = tokio::fs::try_exists(self.record_path(key))
            .await
            .map_err(StoreError::from);
        Ok(absorb(BACKEND, "has", key, exists, false))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(absorb(BACKEND, "get", key, self.try_get(key).await, None))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        Ok(absorb(BACKEND, "set", key, self.try_set(key, value).await, ()))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        Ok(absorb(BACKEND, "remove", key, self.try_remove(key).await, ()))
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

/// Escape a key into a portable file stem.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
