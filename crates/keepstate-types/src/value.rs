use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::element::ElementRef;
use crate::marker::TypeMarker;

/// Reference to a function value.
///
/// Only the name survives persistence. A restored function is inert: it can
/// be inspected but there is nothing to call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub name: String,
}

impl FunctionRef {
    /// A named function. Empty names become `"anonymous"`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self::anonymous()
        } else {
            Self { name }
        }
    }

    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
        }
    }
}

/// Instance of a user-defined class: its class name plus a shallow copy of
/// its own fields. Methods are not captured.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ClassInstance {
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl ClassInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: set a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// An error value (`name`, `message`, optional `stack`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Builder: attach a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Dynamic state tree.
///
/// The plain variants mirror JSON. The remaining variants are the special
/// types a JSON document cannot hold directly; the codec wraps each of them
/// in a `{"__type": ..., "value": ...}` envelope on the way out.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Date(DateTime<Utc>),
    /// Key/value pairs in insertion order. Keys may be any value.
    Map(Vec<(Value, Value)>),
    /// Members in insertion order, without duplicates.
    Set(Vec<Value>),
    /// A symbol, known only by its description.
    Symbol(Option<String>),
    Function(FunctionRef),
    Class(ClassInstance),
    Error(ErrorValue),
    Element(ElementRef),
    /// A weakly held collection. It cannot be persisted and encodes as `null`.
    Weak,
}

impl Value {
    /// Build an object from `(key, value)` pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a map from `(key, value)` pairs. A repeated key overwrites the
    /// earlier entry in place, keeping its original position.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (k, v) in entries {
            let (k, v) = (k.into(), v.into());
            match out.iter_mut().find(|(existing, _)| *existing == k) {
                Some(slot) => slot.1 = v,
                None => out.push((k, v)),
            }
        }
        Value::Map(out)
    }

    /// Build a set, dropping repeated members.
    pub fn set<V, I>(members: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let mut out: Vec<Value> = Vec::new();
        for member in members {
            let member = member.into();
            if !out.contains(&member) {
                out.push(member);
            }
        }
        Value::Set(out)
    }

    /// The special-type marker for this value, if it is one.
    pub fn marker(&self) -> Option<TypeMarker> {
        match self {
            Value::Date(_) => Some(TypeMarker::Date),
            Value::Map(_) => Some(TypeMarker::Map),
            Value::Set(_) => Some(TypeMarker::Set),
            Value::Symbol(_) => Some(TypeMarker::Symbol),
            Value::Function(_) => Some(TypeMarker::Function),
            Value::Class(_) => Some(TypeMarker::Class),
            Value::Error(_) => Some(TypeMarker::Error),
            Value::Element(_) => Some(TypeMarker::DomElement),
            _ => None,
        }
    }

    /// Short name of the variant, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Weak => "weak",
            other => other.marker().map(|m| m.as_str()).unwrap_or("unknown"),
        }
    }

    /// Returns `true` for values that have no children and no marker.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a field of an object. Returns `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Look up a map entry by key. Returns `None` for non-maps.
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Set a field on an object. Returns `false` (and does nothing) if
    /// `self` is not an object.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        match self.as_object_mut() {
            Some(map) => {
                map.insert(key.into(), value.into());
                true
            }
            None => false,
        }
    }

    /// Convert plain JSON into a value tree. Envelopes are *not* interpreted
    /// here; that is the codec's job.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Lossy conversion to plain JSON, for display. Special types collapse to
    /// their most readable plain form (dates to RFC 3339, maps to arrays of
    /// pairs, elements to selectors, weak collections to `null`).
    pub fn to_plain_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null | Value::Weak => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Number(n) => J::Number(n.clone()),
            Value::String(s) => J::String(s.clone()),
            Value::Array(items) | Value::Set(items) => {
                J::Array(items.iter().map(Value::to_plain_json).collect())
            }
            Value::Object(map) => J::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
            Value::Date(d) => J::String(d.to_rfc3339()),
            Value::Map(entries) => J::Array(
                entries
                    .iter()
                    .map(|(k, v)| J::Array(vec![k.to_plain_json(), v.to_plain_json()]))
                    .collect(),
            ),
            Value::Symbol(desc) => desc.clone().map(J::String).unwrap_or(J::Null),
            Value::Function(f) => J::String(f.name.clone()),
            Value::Class(c) => J::Object(
                c.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
            Value::Error(e) => serde_json::json!({
                "name": e.name,
                "message": e.message,
                "stack": e.stack,
            }),
            Value::Element(el) => J::String(el.selector()),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<ElementRef> for Value {
    fn from(el: ElementRef) -> Self {
        Value::Element(el)
    }
}

impl From<ClassInstance> for Value {
    fn from(c: ClassInstance) -> Self {
        Value::Class(c)
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(e)
    }
}

impl From<FunctionRef> for Value {
    fn from(f: FunctionRef) -> Self {
        Value::Function(f)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_builder() {
        let v = Value::object([("a", 1), ("b", 2)]);
        assert_eq!(v.get("a").and_then(Value::as_i64), Some(1));
        assert_eq!(v.get("missing"), None);
    }

    #[test]
    fn map_keeps_insertion_order_and_overwrites() {
        let v = Value::map([("z", 1), ("a", 2), ("z", 3)]);
        match &v {
            Value::Map(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0], (Value::from("z"), Value::from(3)));
                assert_eq!(entries[1], (Value::from("a"), Value::from(2)));
            }
            other => panic!("expected map, got {:?}", other),
        }
        assert_eq!(v.map_get(&"a".into()), Some(&Value::from(2)));
    }

    #[test]
    fn set_drops_duplicates() {
        let v = Value::set([1, 2, 1, 3]);
        assert_eq!(v, Value::Set(vec![1.into(), 2.into(), 3.into()]));
    }

    #[test]
    fn markers_and_kinds() {
        assert_eq!(Value::set([1]).marker(), Some(TypeMarker::Set));
        assert_eq!(Value::from(1).marker(), None);
        assert_eq!(Value::Element(ElementRef::new("div")).kind(), "DOMElement");
        assert_eq!(Value::Weak.kind(), "weak");
        assert!(Value::from("x").is_primitive());
        assert!(!Value::set([1]).is_primitive());
    }

    #[test]
    fn from_json_is_structural() {
        let v = Value::from_json(json!({"count": 5, "tags": ["a", "b"], "n": null}));
        assert_eq!(v.get("count").and_then(Value::as_i64), Some(5));
        assert_eq!(
            v.get("tags"),
            Some(&Value::Array(vec!["a".into(), "b".into()]))
        );
        assert_eq!(v.get("n"), Some(&Value::Null));
    }

    #[test]
    fn from_json_does_not_interpret_envelopes() {
        let v = Value::from_json(json!({"__type": "Set", "value": [1]}));
        assert!(v.as_object().is_some());
    }

    #[test]
    fn plain_json_projection() {
        let v = Value::object([
            ("when", Value::Date("2024-01-02T03:04:05Z".parse().unwrap())),
            ("lookup", Value::map([("a", 1)])),
            ("weak", Value::Weak),
        ]);
        assert_eq!(
            v.to_plain_json(),
            json!({
                "when": "2024-01-02T03:04:05+00:00",
                "lookup": [["a", 1]],
                "weak": null,
            })
        );
    }

    #[test]
    fn non_finite_float_is_null() {
        assert_eq!(Value::from(f64::NAN), Value::Null);
    }

    #[test]
    fn insert_only_on_objects() {
        let mut obj = Value::object::<&str, Value, _>([]);
        assert!(obj.insert("k", 1));
        let mut arr = Value::Array(vec![]);
        assert!(!arr.insert("k", 1));
    }

    #[test]
    fn anonymous_function_name() {
        assert_eq!(FunctionRef::new("").name, "anonymous");
        assert_eq!(FunctionRef::new("onClick").name, "onClick");
    }
}
