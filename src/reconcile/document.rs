//! # Opaque configuration document.
//!
//! [`ConfigDocument`] carries a JSON object from the configuration store to the
//! device collaborator without interpreting it. Typed accessors never fail:
//! an absent key or a value of the wrong type yields the caller's default.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An immutable JSON object loaded from `<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument(Map<String, Value>);

impl ConfigDocument {
    /// Decodes a document; anything other than a JSON object is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Decodes `key` into `T`; `None` when absent or mistyped.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| T::deserialize(v).ok())
    }

    /// Unsigned integer at `key`, or `default`.
    pub fn u32_or(&self, key: &str, default: u32) -> u32 {
        self.field(key).unwrap_or(default)
    }

    /// String at `key`, or `default`.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(Value::as_str).unwrap_or(default)
    }
}

impl From<Map<String, Value>> for ConfigDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> ConfigDocument {
        match v {
            Value::Object(map) => map.into(),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(ConfigDocument::from_slice(b"[1, 2]").is_err());
        assert!(ConfigDocument::from_slice(b"\"text\"").is_err());
        assert!(ConfigDocument::from_slice(b"{}").is_ok_and(|d| d.is_empty()));
    }

    #[test]
    fn accessors_default_on_absence_and_type_mismatch() {
        let d = doc(json!({
            "averagecount": "five",
            "sampleperiodms": -3,
            "datafolder": 17,
            "gain": 4
        }));
        assert_eq!(d.u32_or("averagecount", 10), 10);
        assert_eq!(d.u32_or("sampleperiodms", 1), 1);
        assert_eq!(d.u32_or("missing", 7), 7);
        assert_eq!(d.u32_or("gain", 1), 4);
        assert_eq!(d.str_or("datafolder", "/trake/data"), "/trake/data");
    }

    #[test]
    fn nested_fields_decode_into_typed_values() {
        let d = doc(json!({ "pairs": [[0, 1], [2, 3]] }));
        let pairs: Option<Vec<(u8, u8)>> = d.field("pairs");
        assert_eq!(pairs, Some(vec![(0, 1), (2, 3)]));
        let wrong: Option<Vec<String>> = d.field("pairs");
        assert_eq!(wrong, None);
    }
}
