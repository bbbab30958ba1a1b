use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::directory::DirectoryStorage;
use crate::error::{StoreError, StoreResult};
use crate::file::FileStorage;
use crate::memory::MemoryStorage;
use crate::traits::Storage;

/// File-driven choice of storage backend.
///
/// ```toml
/// backend = "directory"
/// path = "/var/lib/app/state"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
    Directory {
        path: PathBuf,
    },
    #[cfg(feature = "redb")]
    Redb {
        path: PathBuf,
        #[serde(default = "default_redb_table")]
        table: String,
    },
    #[cfg(feature = "sqlite")]
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_sqlite_table")]
        table: String,
    },
}

#[cfg(feature = "redb")]
fn default_redb_table() -> String {
    crate::embedded::DEFAULT_TABLE.to_string()
}

#[cfg(feature = "sqlite")]
fn default_sqlite_table() -> String {
    crate::sqlite::DEFAULT_TABLE.to_string()
}

impl StorageConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Short backend name.
    pub fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::Memory => "memory",
            StorageConfig::File { .. } => "file",
            StorageConfig::Directory { .. } => "directory",
            #[cfg(feature = "redb")]
            StorageConfig::Redb { .. } => "redb",
            #[cfg(feature = "sqlite")]
            StorageConfig::Sqlite { .. } => "sqlite",
        }
    }

    /// Construct the configured backend.
    pub fn build(&self) -> StoreResult<Storage> {
        let storage = match self {
            StorageConfig::Memory => Storage::sync(MemoryStorage::new()),
            StorageConfig::File { path } => Storage::sync(FileStorage::open(path)?),
            StorageConfig::Directory { path } => {
                Storage::asynchronous(DirectoryStorage::open(path)?)
            }
            #[cfg(feature = "redb")]
            StorageConfig::Redb { path, table } => {
                Storage::sync(crate::embedded::RedbStorage::open_table(path, table.clone())?)
            }
            #[cfg(feature = "sqlite")]
            StorageConfig::Sqlite { path, table } => {
                Storage::sync(crate::sqlite::SqliteStorage::open_table(path, table.clone())?)
            }
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_is_memory() {
        assert_eq!(StorageConfig::default(), StorageConfig::Memory);
        let storage = StorageConfig::default().build().unwrap();
        assert!(storage.is_sync());
        assert_eq!(storage.backend_name(), "memory");
    }

    #[test]
    fn parse_directory() {
        let config = StorageConfig::from_toml_str(
            r#"
            backend = "directory"
            path = "/tmp/keepstate"
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            StorageConfig::Directory {
                path: PathBuf::from("/tmp/keepstate")
            }
        );
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let err = StorageConfig::from_toml_str("backend = \"cloud\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn build_file_and_directory() {
        let dir = TempDir::new().unwrap();
        let file = StorageConfig::File {
            path: dir.path().join("state.json"),
        }
        .build()
        .unwrap();
        assert!(file.is_sync());

        let per_key = StorageConfig::Directory {
            path: dir.path().join("records"),
        }
        .build()
        .unwrap();
        assert!(!per_key.is_sync());
        assert_eq!(per_key.backend_name(), "directory");
    }

    #[test]
    fn load_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.toml");
        std::fs::write(&path, "backend = \"memory\"\n").unwrap();
        assert_eq!(StorageConfig::load(&path).unwrap(), StorageConfig::Memory);
        assert!(StorageConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
