use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Immutable point-in-time copy of a state.
///
/// Snapshots share their payload through an `Arc`; cloning one never copies
/// the state. Nothing hands out `&mut T`, so a snapshot cannot change after
/// it is taken.
pub struct Snapshot<T>(Arc<T>);

impl<T> Snapshot<T> {
    /// Wrap an owned state.
    pub fn new(state: T) -> Self {
        Self(Arc::new(state))
    }

    /// Wrap an already shared state.
    pub fn from_arc(state: Arc<T>) -> Self {
        Self(state)
    }

    /// Returns `true` if both snapshots point at the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// The shared payload.
    pub fn as_arc(&self) -> &Arc<T> {
        &self.0
    }
}

impl<T: Clone> Snapshot<T> {
    /// Clone the payload out of the snapshot.
    pub fn to_owned_state(&self) -> T {
        (*self.0).clone()
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: PartialEq> PartialEq for Snapshot<T> {
    fn eq(&self, other: &Self) -> bool {
        Snapshot::ptr_eq(self, other) || *self.0 == *other.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Snapshot").field(&*self.0).finish()
    }
}

/// Namespace key under which one store's record is persisted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey(String);

impl StoreKey {
    /// Validate and wrap a key. Keys must be non-empty after trimming.
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(TypeError::EmptyKey);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StoreKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.0
    }
}

impl AsRef<str> for StoreKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({})", self.0)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_clone_shares_payload() {
        let a = Snapshot::new(vec![1, 2, 3]);
        let b = a.clone();
        assert!(Snapshot::ptr_eq(&a, &b));
        assert_eq!(*b, vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_equality_is_structural() {
        let a = Snapshot::new(String::from("x"));
        let b = Snapshot::new(String::from("x"));
        assert!(!Snapshot::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(StoreKey::new("").unwrap_err(), TypeError::EmptyKey);
        assert_eq!(StoreKey::new("   ").unwrap_err(), TypeError::EmptyKey);
    }

    #[test]
    fn key_serde_validates() {
        let key: StoreKey = serde_json::from_str("\"prefs\"").unwrap();
        assert_eq!(key.as_str(), "prefs");
        assert!(serde_json::from_str::<StoreKey>("\"\"").is_err());
    }
}
