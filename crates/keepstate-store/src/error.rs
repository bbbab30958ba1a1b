use std::path::PathBuf;

use tracing::warn;

/// Errors from storage operations.
///
/// Only construction surfaces these to callers as a matter of course. The
/// built-in adapters absorb runtime failures at their boundary (see
/// [`absorb`]); custom adapters may return them and the orchestrator logs
/// them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The adapter was configured with an unusable argument.
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// The backing environment is missing or could not be opened.
    #[error("{backend} storage unavailable at {path}: {reason}")]
    Unavailable {
        backend: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A backend-internal encoding step failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other backend-reported failure.
    #[error("{backend} backend error: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },
}

impl StoreError {
    pub fn backend(backend: &'static str, reason: impl ToString) -> Self {
        StoreError::Backend {
            backend,
            reason: reason.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Convert a runtime failure into the "absent" result at an adapter
/// boundary, logging what was swallowed.
pub fn absorb<T>(
    backend: &'static str,
    op: &'static str,
    key: &str,
    result: StoreResult<T>,
    absent: T,
) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            warn!(backend, op, key, %error, "storage operation failed; treating as absent");
            absent
        }
    }
}
