use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use keepstate_store::{Storage, StorageConfig};

use crate::cli::{Backend, Cli};

/// Work out which backend the invocation refers to.
pub fn storage_config(cli: &Cli) -> anyhow::Result<StorageConfig> {
    if let Some(path) = &cli.config {
        return StorageConfig::load(path)
            .with_context(|| format!("loading {}", path.display()));
    }
    from_flags(cli.backend, cli.path.as_deref())
}

pub fn open(config: &StorageConfig) -> anyhow::Result<Storage> {
    config
        .build()
        .with_context(|| format!("opening {} backend", config.backend_name()))
}

fn from_flags(backend: Backend, path: Option<&Path>) -> anyhow::Result<StorageConfig> {
    let location = |default: &str| path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(default));
    let config = match backend {
        Backend::Memory => StorageConfig::Memory,
        Backend::File => StorageConfig::File {
            path: location("keepstate.json"),
        },
        Backend::Dir => StorageConfig::Directory {
            path: location("keepstate.d"),
        },
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => StorageConfig::Sqlite {
            path: location("keepstate.db"),
            table: keepstate_store::sqlite::DEFAULT_TABLE.to_string(),
        },
        #[cfg(feature = "redb")]
        Backend::Redb => StorageConfig::Redb {
            path: location("keepstate.redb"),
            table: keepstate_store::embedded::DEFAULT_TABLE.to_string(),
        },
        #[allow(unreachable_patterns)]
        other => bail!("this build has no {:?} support; rebuild with the matching feature", other),
    };
    Ok(config)
}
