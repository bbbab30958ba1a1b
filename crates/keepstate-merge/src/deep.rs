use keepstate_types::{ClassInstance, ErrorValue, Value};

use crate::error::MergeResult;
use crate::traits::MergeStrategy;

/// Recursive structural merge.
///
/// Rules, applied at each `(initial, restored)` node pair:
///
/// 1. A primitive (or null) restored value wins.
/// 2. An array restored value replaces the initial value; arrays are never
///    merged element-wise.
/// 3. A special-type restored value merges with an initial value of the
///    same type: maps and sets are unioned (restored entries win on key
///    collision), errors take restored fields over initial ones, class
///    instances merge their fields recursively. Dates, symbols, functions
///    and elements have no meaningful merge and the restored value wins.
///    Against any other initial value, the restored value wins.
/// 4. Two plain objects merge key by key, starting from a copy of the
///    initial object.
/// 5. Anything else: the restored value wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeepMerge;

impl MergeStrategy<Value> for DeepMerge {
    fn merge(&self, initial: &Value, restored: &Value) -> MergeResult<Value> {
        Ok(deep_merge(initial, restored))
    }
}

/// Merge `source` into `target` following the [`DeepMerge`] rules.
pub fn deep_merge(target: &Value, source: &Value) -> Value {
    if source.is_primitive() {
        return source.clone();
    }
    match (target, source) {
        (_, Value::Array(_)) => source.clone(),
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = match base.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ if source.marker().is_some() => merge_special(target, source),
        _ => source.clone(),
    }
}

fn merge_special(target: &Value, source: &Value) -> Value {
    match (target, source) {
        (Value::Map(base), Value::Map(overlay)) => {
            Value::map(base.iter().chain(overlay.iter()).cloned())
        }
        (Value::Set(base), Value::Set(overlay)) => {
            Value::set(base.iter().chain(overlay.iter()).cloned())
        }
        (Value::Error(base), Value::Error(overlay)) => Value::Error(ErrorValue {
            name: overlay.name.clone(),
            message: overlay.message.clone(),
            stack: overlay.stack.clone().or_else(|| base.stack.clone()),
        }),
        (Value::Class(base), Value::Class(overlay)) => {
            let fields = match deep_merge(
                &Value::Object(base.fields.clone()),
                &Value::Object(overlay.fields.clone()),
            ) {
                Value::Object(fields) => fields,
                _ => overlay.fields.clone(),
            };
            let name = if overlay.name.is_empty() {
                base.name.clone()
            } else {
                overlay.name.clone()
            };
            Value::Class(ClassInstance { name, fields })
        }
        _ => source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use keepstate_types::{ElementRef, FunctionRef};
    use proptest::prelude::*;

    fn date(s: &str) -> Value {
        Value::Date(s.parse::<DateTime<Utc>>().unwrap())
    }

    // -----------------------------------------------------------------------
    // Plain structure
    // -----------------------------------------------------------------------

    #[test]
    fn nested_keys_merge() {
        let initial = Value::object([("x", Value::object([("a", 1), ("b", 2)]))]);
        let restored = Value::object([("x", Value::object([("b", 3)]))]);
        assert_eq!(
            deep_merge(&initial, &restored),
            Value::object([("x", Value::object([("a", 1), ("b", 3)]))])
        );
    }

    #[test]
    fn primitive_and_null_win() {
        let initial = Value::object([("a", Value::object([("deep", 1)])), ("b", Value::from(2))]);
        let restored = Value::object([("a", Value::Null), ("b", Value::from("two"))]);
        assert_eq!(
            deep_merge(&initial, &restored),
            Value::object([("a", Value::Null), ("b", Value::from("two"))])
        );
    }

    #[test]
    fn arrays_replace() {
        let initial = Value::object([("list", Value::Array(vec![1.into(), 2.into(), 3.into()]))]);
        let restored = Value::object([("list", Value::Array(vec![9.into()]))]);
        assert_eq!(deep_merge(&initial, &restored), restored);
    }

    #[test]
    fn object_over_primitive_is_cloned() {
        let initial = Value::object([("cfg", Value::from(0))]);
        let restored = Value::object([("cfg", Value::object([("on", true)]))]);
        assert_eq!(deep_merge(&initial, &restored), restored);
    }

    #[test]
    fn keys_only_in_initial_survive() {
        let initial = Value::object([("keep", 1), ("over", 2)]);
        let restored = Value::object([("over", 3)]);
        assert_eq!(
            deep_merge(&initial, &restored),
            Value::object([("keep", 1), ("over", 3)])
        );
    }

    // -----------------------------------------------------------------------
    // Special types
    // -----------------------------------------------------------------------

    #[test]
    fn maps_union_with_restored_override() {
        let initial = Value::map([("a", 1), ("b", 2)]);
        let restored = Value::map([("b", 20), ("c", 30)]);
        assert_eq!(
            deep_merge(&initial, &restored),
            Value::map([("a", 1), ("b", 20), ("c", 30)])
        );
    }

    #[test]
    fn sets_union() {
        let merged = deep_merge(&Value::set([1, 2]), &Value::set([2, 3]));
        assert_eq!(merged, Value::set([1, 2, 3]));
    }

    #[test]
    fn errors_merge_fields() {
        let initial = Value::Error(ErrorValue::new("Error", "old").with_stack("trace"));
        let restored = Value::Error(ErrorValue::new("TypeError", "new"));
        assert_eq!(
            deep_merge(&initial, &restored),
            Value::Error(ErrorValue::new("TypeError", "new").with_stack("trace"))
        );
    }

    #[test]
    fn class_fields_merge_recursively() {
        let initial = Value::Class(
            ClassInstance::new("Settings")
                .with_field("theme", "light")
                .with_field("layout", Value::object([("cols", 2), ("rows", 3)])),
        );
        let restored = Value::Class(
            ClassInstance::new("")
                .with_field("layout", Value::object([("cols", 4)])),
        );
        assert_eq!(
            deep_merge(&initial, &restored),
            Value::Class(
                ClassInstance::new("Settings")
                    .with_field("theme", "light")
                    .with_field("layout", Value::object([("cols", 4), ("rows", 3)])),
            )
        );
    }

    #[test]
    fn class_prefers_restored_name() {
        let merged = deep_merge(
            &Value::Class(ClassInstance::new("V1")),
            &Value::Class(ClassInstance::new("V2")),
        );
        assert!(matches!(merged, Value::Class(c) if c.name == "V2"));
    }

    #[test]
    fn atomic_special_types_replace() {
        let pairs = [
            (date("2020-01-01T00:00:00Z"), date("2021-01-01T00:00:00Z")),
            (Value::Symbol(Some("a".into())), Value::Symbol(Some("b".into()))),
            (
                Value::Function(FunctionRef::new("f")),
                Value::Function(FunctionRef::new("g")),
            ),
            (
                Value::Element(ElementRef::new("div")),
                Value::Element(ElementRef::new("span")),
            ),
        ];
        for (initial, restored) in pairs {
            assert_eq!(deep_merge(&initial, &restored), restored);
        }
    }

    #[test]
    fn mismatched_special_types_replace() {
        let merged = deep_merge(&Value::set([1]), &Value::map([("a", 1)]));
        assert_eq!(merged, Value::map([("a", 1)]));
        let over_object = deep_merge(&Value::object([("a", 1)]), &Value::set([1]));
        assert_eq!(over_object, Value::set([1]));
    }

    #[test]
    fn nested_special_types_merge_inside_objects() {
        let initial = Value::object([("seen", Value::set(["x"])), ("n", Value::from(1))]);
        let restored = Value::object([("seen", Value::set(["y"]))]);
        assert_eq!(
            deep_merge(&initial, &restored),
            Value::object([("seen", Value::set(["x", "y"])), ("n", Value::from(1))])
        );
    }

    #[test]
    fn strategy_wrapper() {
        let merged = DeepMerge
            .merge(&Value::object([("a", 1)]), &Value::object([("b", 2)]))
            .unwrap();
        assert_eq!(merged, Value::object([("a", 1), ("b", 2)]));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn flat_object() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-d]", any::<i64>().prop_map(Value::from), 0..4)
            .prop_map(Value::Object)
    }

    proptest! {
        #[test]
        fn merging_with_self_is_identity(v in flat_object()) {
            prop_assert_eq!(deep_merge(&v, &v), v);
        }

        #[test]
        fn restored_keys_always_win(a in flat_object(), b in flat_object()) {
            let merged = deep_merge(&a, &b);
            for (key, value) in b.as_object().unwrap() {
                prop_assert_eq!(merged.get(key), Some(value));
            }
            for key in a.as_object().unwrap().keys() {
                prop_assert!(merged.get(key).is_some());
            }
        }
    }
}
