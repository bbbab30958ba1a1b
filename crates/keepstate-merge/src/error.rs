//! Error types for the merge crate.

/// Errors that can occur while merging a restored state into a default one.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MergeError {
    /// The inputs do not have shapes the strategy can combine.
    #[error("cannot merge {restored} into {initial}")]
    Incompatible {
        initial: &'static str,
        restored: &'static str,
    },
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
