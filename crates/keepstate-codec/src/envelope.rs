//! Type-preserving JSON encoding of [`Value`] trees.
//!
//! Special types are wrapped in envelopes before the tree is written as
//! JSON text:
//!
//! ```text
//! {"__type": "Date",       "value": "2024-01-02T03:04:05.000Z"}
//! {"__type": "Map",        "value": [[key, value], ...]}
//! {"__type": "Set",        "value": [member, ...]}
//! {"__type": "Symbol",     "value": "description" | null}
//! {"__type": "Function",   "value": "name"}
//! {"__type": "Error",      "value": {"message": .., "name": .., "stack": ..}}
//! {"__type": "Class",      "className": "Point", "value": {fields}}
//! {"__type": "DOMElement", "value": "div#id.class"}
//! ```
//!
//! Decoding switches on `__type`. Unknown markers decode as plain objects;
//! a known marker with a malformed payload decodes to its raw `value` (or
//! `null` when there is none).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map as JsonMap, Value as Json};
use tracing::debug;

use keepstate_types::{ClassInstance, ElementRef, ErrorValue, FunctionRef, TypeMarker, Value};

use crate::error::{CodecError, CodecResult};
use crate::traits::Serializer;

/// Field naming the special type of an envelope.
pub const TYPE_FIELD: &str = "__type";
/// Field holding the envelope payload.
pub const VALUE_FIELD: &str = "value";
/// Extra field carried by class envelopes.
pub const CLASS_NAME_FIELD: &str = "className";

/// The default serialization strategy for [`Value`] states.
#[derive(Clone, Debug, Default)]
pub struct JsonEnvelopeSerializer {
    pretty: bool,
}

impl JsonEnvelopeSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit indented JSON instead of compact JSON.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer<Value> for JsonEnvelopeSerializer {
    fn serialize(&self, state: &Value) -> CodecResult<String> {
        let tree = to_envelope(state);
        let text = if self.pretty {
            serde_json::to_string_pretty(&tree)
        } else {
            serde_json::to_string(&tree)
        };
        text.map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn deserialize(&self, text: &str) -> CodecResult<Value> {
        let tree: Json =
            serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(from_envelope(tree))
    }
}

fn envelope(marker: TypeMarker, value: Json) -> Json {
    json!({ TYPE_FIELD: marker.as_str(), VALUE_FIELD: value })
}

fn fields_to_envelope<'a>(
    fields: impl IntoIterator<Item = (&'a String, &'a Value)>,
) -> JsonMap<String, Json> {
    fields
        .into_iter()
        .map(|(k, v)| (k.clone(), to_envelope(v)))
        .collect()
}

/// ISO-8601 in UTC. Whole milliseconds keep the three-digit form; finer
/// instants keep every sub-second digit.
fn date_text(date: &DateTime<Utc>) -> String {
    let format = if date.timestamp_subsec_nanos() % 1_000_000 == 0 {
        SecondsFormat::Millis
    } else {
        SecondsFormat::AutoSi
    };
    date.to_rfc3339_opts(format, true)
}

/// Convert a value tree into an envelope-tagged JSON tree.
pub fn to_envelope(value: &Value) -> Json {
    match value {
        Value::Null | Value::Weak => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::String(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(to_envelope).collect()),
        Value::Object(map) => Json::Object(fields_to_envelope(map)),
        Value::Date(d) => envelope(TypeMarker::Date, Json::String(date_text(d))),
        Value::Map(entries) => envelope(
            TypeMarker::Map,
            Json::Array(
                entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![to_envelope(k), to_envelope(v)]))
                    .collect(),
            ),
        ),
        Value::Set(members) => envelope(
            TypeMarker::Set,
            Json::Array(members.iter().map(to_envelope).collect()),
        ),
        Value::Symbol(desc) => envelope(
            TypeMarker::Symbol,
            desc.clone().map(Json::String).unwrap_or(Json::Null),
        ),
        Value::Function(f) => envelope(TypeMarker::Function, Json::String(f.name.clone())),
        Value::Error(e) => envelope(
            TypeMarker::Error,
            json!({ "message": e.message, "name": e.name, "stack": e.stack }),
        ),
        Value::Class(c) => json!({
            TYPE_FIELD: TypeMarker::Class.as_str(),
            CLASS_NAME_FIELD: c.name,
            VALUE_FIELD: Json::Object(fields_to_envelope(&c.fields)),
        }),
        Value::Element(el) => envelope(TypeMarker::DomElement, Json::String(el.selector())),
    }
}

/// Convert an envelope-tagged JSON tree back into a value tree.
pub fn from_envelope(json: Json) -> Value {
    match json {
        Json::Array(items) => Value::Array(items.into_iter().map(from_envelope).collect()),
        Json::Object(mut map) => {
            let marker = map
                .get(TYPE_FIELD)
                .and_then(Json::as_str)
                .and_then(|s| s.parse::<TypeMarker>().ok());
            match marker {
                Some(marker) => decode_special(marker, &mut map),
                None => Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, from_envelope(v)))
                        .collect(),
                ),
            }
        }
        plain => Value::from_json(plain),
    }
}

fn decode_special(marker: TypeMarker, map: &mut JsonMap<String, Json>) -> Value {
    let payload = map.remove(VALUE_FIELD).unwrap_or(Json::Null);
    match try_decode_special(marker, &payload, map) {
        Some(value) => value,
        None => {
            debug!(%marker, "malformed envelope; falling back to raw value");
            from_envelope(payload)
        }
    }
}

fn try_decode_special(
    marker: TypeMarker,
    payload: &Json,
    envelope: &JsonMap<String, Json>,
) -> Option<Value> {
    let value = match marker {
        TypeMarker::Date => {
            let text = payload.as_str()?;
            let parsed = DateTime::parse_from_rfc3339(text).ok()?;
            Value::Date(parsed.with_timezone(&Utc))
        }
        TypeMarker::Map => {
            let mut entries = Vec::new();
            for pair in payload.as_array()? {
                match pair.as_array().map(Vec::as_slice) {
                    Some([k, v]) => {
                        entries.push((from_envelope(k.clone()), from_envelope(v.clone())))
                    }
                    _ => return None,
                }
            }
            Value::map(entries)
        }
        TypeMarker::Set => Value::set(payload.as_array()?.iter().cloned().map(from_envelope)),
        TypeMarker::Symbol => match payload {
            Json::Null => Value::Symbol(None),
            Json::String(desc) => Value::Symbol(Some(desc.clone())),
            _ => return None,
        },
        TypeMarker::Function => match payload {
            Json::String(name) => Value::Function(FunctionRef::new(name.clone())),
            _ => Value::Function(FunctionRef::anonymous()),
        },
        TypeMarker::Error => {
            let fields = payload.as_object()?;
            let text = |key: &str| fields.get(key).and_then(Json::as_str).map(str::to_string);
            Value::Error(ErrorValue {
                name: text("name").unwrap_or_else(|| "Error".to_string()),
                message: text("message").unwrap_or_default(),
                stack: text("stack"),
            })
        }
        TypeMarker::Class => {
            let fields = payload.as_object()?;
            let name = envelope
                .get(CLASS_NAME_FIELD)
                .and_then(Json::as_str)
                .unwrap_or("Object")
                .to_string();
            Value::Class(ClassInstance {
                name,
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), from_envelope(v.clone())))
                    .collect(),
            })
        }
        TypeMarker::DomElement => {
            Value::Element(ElementRef::from_selector(payload.as_str()?).ok()?)
        }
    };
    Some(value)
}
