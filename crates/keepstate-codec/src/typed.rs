use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};
use crate::traits::Serializer;

/// Plain `serde_json` strategy for statically typed states.
///
/// No envelopes are involved: whatever `T`'s `Serialize` impl emits is the
/// stored record.
pub struct SerdeJsonSerializer<T> {
    _state: PhantomData<fn() -> T>,
}

impl<T> SerdeJsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            _state: PhantomData,
        }
    }
}

impl<T> Default for SerdeJsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Serializer<T> for SerdeJsonSerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, state: &T) -> CodecResult<String> {
        serde_json::to_string(state).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn deserialize(&self, text: &str) -> CodecResult<T> {
        serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

impl<T> std::fmt::Debug for SerdeJsonSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SerdeJsonSerializer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        font_size: u8,
    }

    #[test]
    fn typed_roundtrip() {
        let codec = SerdeJsonSerializer::<Prefs>::new();
        let prefs = Prefs {
            theme: "dark".into(),
            font_size: 14,
        };
        let text = codec.serialize(&prefs).unwrap();
        assert_eq!(text, r#"{"theme":"dark","font_size":14}"#);
        assert_eq!(codec.deserialize(&text).unwrap(), prefs);
    }

    #[test]
    fn shape_mismatch_is_decode_error() {
        let codec = SerdeJsonSerializer::<Prefs>::new();
        let err = codec.deserialize(r#"{"theme": 3}"#).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
