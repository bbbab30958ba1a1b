use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CodecResult;

/// Converts a state snapshot to a stored string and back.
///
/// Round-trip law: `deserialize(serialize(x))` is structurally equal to `x`
/// for every shape the implementation documents as supported.
pub trait Serializer<T>: Send + Sync {
    fn serialize(&self, state: &T) -> CodecResult<String>;

    fn deserialize(&self, text: &str) -> CodecResult<T>;
}

/// Awaited counterpart of [`Serializer`], for strategies that compress,
/// encrypt, or otherwise do work that may suspend.
#[async_trait]
pub trait AsyncSerializer<T>: Send + Sync {
    async fn serialize(&self, state: &T) -> CodecResult<String>;

    async fn deserialize(&self, text: &str) -> CodecResult<T>;
}

/// A serialization strategy, tagged with how it can be driven.
pub enum Serialization<T> {
    Sync(Arc<dyn Serializer<T>>),
    Async(Arc<dyn AsyncSerializer<T>>),
}

impl<T: Send + Sync> Serialization<T> {
    pub fn sync(serializer: impl Serializer<T> + 'static) -> Self {
        Serialization::Sync(Arc::new(serializer))
    }

    pub fn asynchronous(serializer: impl AsyncSerializer<T> + 'static) -> Self {
        Serialization::Async(Arc::new(serializer))
    }

    /// Returns `true` if decoding can complete without awaiting.
    pub fn is_sync(&self) -> bool {
        matches!(self, Serialization::Sync(_))
    }

    pub fn as_sync(&self) -> Option<&Arc<dyn Serializer<T>>> {
        match self {
            Serialization::Sync(serializer) => Some(serializer),
            Serialization::Async(_) => None,
        }
    }

    pub async fn serialize(&self, state: &T) -> CodecResult<String> {
        match self {
            Serialization::Sync(serializer) => serializer.serialize(state),
            Serialization::Async(serializer) => serializer.serialize(state).await,
        }
    }

    pub async fn deserialize(&self, text: &str) -> CodecResult<T> {
        match self {
            Serialization::Sync(serializer) => serializer.deserialize(text),
            Serialization::Async(serializer) => serializer.deserialize(text).await,
        }
    }
}

impl<T> Clone for Serialization<T> {
    fn clone(&self) -> Self {
        match self {
            Serialization::Sync(serializer) => Serialization::Sync(Arc::clone(serializer)),
            Serialization::Async(serializer) => Serialization::Async(Arc::clone(serializer)),
        }
    }
}

impl<T> std::fmt::Debug for Serialization<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            Serialization::Sync(_) => "sync",
            Serialization::Async(_) => "async",
        };
        f.debug_tuple("Serialization").field(&mode).finish()
    }
}
