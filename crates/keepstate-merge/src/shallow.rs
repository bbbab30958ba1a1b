use keepstate_types::Value;
use tracing::debug;

use crate::error::{MergeError, MergeResult};
use crate::traits::MergeStrategy;

/// Top-level override: every key of the restored state wins, keys present
/// only in the default survive, nested values are replaced wholesale.
///
/// By default keys that exist only in the restored state are kept. With
/// [`ShallowMerge::pruning`], they are dropped instead, so a record written
/// by an older schema cannot reintroduce fields the current default no
/// longer has.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShallowMerge {
    prune_unknown: bool,
}

impl ShallowMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shallow merge that drops restored keys absent from the default.
    pub fn pruning() -> Self {
        Self {
            prune_unknown: true,
        }
    }

    pub fn prunes_unknown(&self) -> bool {
        self.prune_unknown
    }
}

impl MergeStrategy<Value> for ShallowMerge {
    fn merge(&self, initial: &Value, restored: &Value) -> MergeResult<Value> {
        let (Value::Object(base), Value::Object(overlay)) = (initial, restored) else {
            return Err(MergeError::Incompatible {
                initial: initial.kind(),
                restored: restored.kind(),
            });
        };

        let mut merged = base.clone();
        for (key, value) in overlay {
            if self.prune_unknown && !base.contains_key(key) {
                debug!(key = %key, "dropping restored key absent from default");
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restored_keys_win() {
        let initial = Value::object([("a", 1), ("b", 2)]);
        let restored = Value::object([("b", 3), ("c", 4)]);
        let merged = ShallowMerge::new().merge(&initial, &restored).unwrap();
        assert_eq!(merged, Value::object([("a", 1), ("b", 3), ("c", 4)]));
    }

    #[test]
    fn nested_objects_replaced_wholesale() {
        let initial = Value::object([("x", Value::object([("a", 1), ("b", 2)]))]);
        let restored = Value::object([("x", Value::object([("b", 3)]))]);
        let merged = ShallowMerge::new().merge(&initial, &restored).unwrap();
        assert_eq!(merged, Value::object([("x", Value::object([("b", 3)]))]));
    }

    #[test]
    fn pruning_drops_unknown_keys() {
        let initial = Value::object([("a", 1), ("b", 2)]);
        let restored = Value::object([("b", 3), ("stale", 9)]);
        let merged = ShallowMerge::pruning().merge(&initial, &restored).unwrap();
        assert_eq!(merged, Value::object([("a", 1), ("b", 3)]));
    }

    #[test]
    fn inputs_untouched() {
        let initial = Value::object([("a", 1)]);
        let restored = Value::object([("a", 2)]);
        let _ = ShallowMerge::new().merge(&initial, &restored).unwrap();
        assert_eq!(initial, Value::object([("a", 1)]));
        assert_eq!(restored, Value::object([("a", 2)]));
    }

    #[test]
    fn non_object_restored_is_incompatible() {
        let err = ShallowMerge::new()
            .merge(&Value::object([("a", 1)]), &Value::from(5))
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::Incompatible {
                initial: "object",
                restored: "number"
            }
        );
    }
}
