use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("store key must not be empty")]
    EmptyKey,

    #[error("unknown type marker: {0}")]
    UnknownMarker(String),

    #[error("invalid element selector: {0:?}")]
    InvalidSelector(String),
}
