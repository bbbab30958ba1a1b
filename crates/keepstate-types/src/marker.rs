use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Tag carried in the `__type` field of a special-type envelope.
///
/// Only these markers are recognized. An envelope whose `__type` is anything
/// else is an ordinary object as far as decoding is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeMarker {
    Date,
    Map,
    Set,
    Symbol,
    Function,
    Class,
    Error,
    #[serde(rename = "DOMElement")]
    DomElement,
}

impl TypeMarker {
    /// Every recognized marker, in declaration order.
    pub const ALL: [TypeMarker; 8] = [
        TypeMarker::Date,
        TypeMarker::Map,
        TypeMarker::Set,
        TypeMarker::Symbol,
        TypeMarker::Function,
        TypeMarker::Class,
        TypeMarker::Error,
        TypeMarker::DomElement,
    ];

    /// The wire spelling of this marker.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeMarker::Date => "Date",
            TypeMarker::Map => "Map",
            TypeMarker::Set => "Set",
            TypeMarker::Symbol => "Symbol",
            TypeMarker::Function => "Function",
            TypeMarker::Class => "Class",
            TypeMarker::Error => "Error",
            TypeMarker::DomElement => "DOMElement",
        }
    }

    /// Returns `true` for markers whose values have no meaningful merge:
    /// the restored value always replaces the initial one.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            TypeMarker::Date | TypeMarker::Symbol | TypeMarker::Function | TypeMarker::DomElement
        )
    }
}

impl fmt::Display for TypeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeMarker {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeMarker::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| TypeError::UnknownMarker(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for marker in TypeMarker::ALL {
            assert_eq!(marker.as_str().parse::<TypeMarker>().unwrap(), marker);
        }
    }

    #[test]
    fn dom_element_spelling() {
        assert_eq!(TypeMarker::DomElement.to_string(), "DOMElement");
        let json = serde_json::to_string(&TypeMarker::DomElement).unwrap();
        assert_eq!(json, "\"DOMElement\"");
    }

    #[test]
    fn unknown_marker_rejected() {
        let err = "WeakMap".parse::<TypeMarker>().unwrap_err();
        assert_eq!(err, TypeError::UnknownMarker("WeakMap".into()));
    }

    #[test]
    fn atomic_markers() {
        assert!(TypeMarker::Date.is_atomic());
        assert!(TypeMarker::DomElement.is_atomic());
        assert!(!TypeMarker::Map.is_atomic());
        assert!(!TypeMarker::Class.is_atomic());
    }
}
