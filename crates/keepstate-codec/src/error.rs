//! Error types for the codec crate.

/// Errors that can occur while encoding or decoding a state record.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The state could not be turned into text.
    #[error("encode error: {0}")]
    Encode(String),

    /// The stored text could not be turned back into a state.
    #[error("decode error: {0}")]
    Decode(String),

    /// A pre/post processing hook failed.
    #[error("{hook} hook failed: {reason}")]
    Hook { hook: &'static str, reason: String },
}

impl CodecError {
    pub fn hook(hook: &'static str, reason: impl ToString) -> Self {
        CodecError::Hook {
            hook,
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias for codec results.
pub type CodecResult<T> = Result<T, CodecError>;
