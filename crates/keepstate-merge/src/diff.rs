//! Top-level comparison of two states.
//!
//! Used to report what a restore changed and what a pending write carries.
//! Object states are compared key by key; any other pair of states compares
//! as a whole under the empty key.

use std::collections::BTreeMap;

use keepstate_types::Value;

/// The result of comparing two states.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueDiff {
    pub changes: Vec<ValueChange>,
}

impl ValueDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.count(|c| matches!(c, ValueChange::Added { .. }))
    }

    pub fn removals(&self) -> usize {
        self.count(|c| matches!(c, ValueChange::Removed { .. }))
    }

    pub fn modifications(&self) -> usize {
        self.count(|c| matches!(c, ValueChange::Modified { .. }))
    }

    /// Keys touched by this diff, in order.
    pub fn keys(&self) -> Vec<&str> {
        self.changes.iter().map(ValueChange::key).collect()
    }

    fn count(&self, pred: impl Fn(&ValueChange) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(c)).count()
    }
}

/// A single top-level change.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueChange {
    Added { key: String, value: Value },
    Removed { key: String, value: Value },
    Modified { key: String, old: Value, new: Value },
}

impl ValueChange {
    pub fn key(&self) -> &str {
        match self {
            ValueChange::Added { key, .. }
            | ValueChange::Removed { key, .. }
            | ValueChange::Modified { key, .. } => key,
        }
    }
}

/// Compute the diff from `old` to `new`.
pub fn diff_values(old: &Value, new: &Value) -> ValueDiff {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => diff_objects(old, new),
        _ if old == new => ValueDiff::new(),
        _ => ValueDiff {
            changes: vec![ValueChange::Modified {
                key: String::new(),
                old: old.clone(),
                new: new.clone(),
            }],
        },
    }
}

fn diff_objects(old: &BTreeMap<String, Value>, new: &BTreeMap<String, Value>) -> ValueDiff {
    let mut changes = Vec::new();

    for (key, old_val) in old {
        match new.get(key) {
            Some(new_val) if new_val != old_val => changes.push(ValueChange::Modified {
                key: key.clone(),
                old: old_val.clone(),
                new: new_val.clone(),
            }),
            Some(_) => {}
            None => changes.push(ValueChange::Removed {
                key: key.clone(),
                value: old_val.clone(),
            }),
        }
    }

    for (key, new_val) in new {
        if !old.contains_key(key) {
            changes.push(ValueChange::Added {
                key: key.clone(),
                value: new_val.clone(),
            });
        }
    }

    ValueDiff { changes }
}
