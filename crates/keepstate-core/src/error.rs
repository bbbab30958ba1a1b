use keepstate_codec::CodecError;
use keepstate_merge::MergeError;
use keepstate_store::StoreError;
use keepstate_types::TypeError;
use thiserror::Error;

/// Errors surfaced by the orchestrator.
///
/// Only setup returns these to the caller. Steady-state operations log
/// failures and carry on.
#[derive(Debug, Error)]
pub enum KeepError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value: {0}")]
    Type(#[from] TypeError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),
}

pub type KeepResult<T> = Result<T, KeepError>;
