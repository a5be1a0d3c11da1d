//! # Canonical Serialization: JCS Byte Production
//!
//! `CanonicalBytes` is the sole construction path for bytes fed into the
//! content-addressing digest. Two schema bodies that differ only in key
//! order or whitespace canonicalize to the same bytes, and therefore to the
//! same SAID.
//!
//! Serialization follows RFC 8785 (JSON Canonicalization Scheme) via
//! `serde_jcs`: sorted keys, compact separators, ECMAScript number
//! formatting. Numbers are passed through as-is; JSON-Schema keywords such
//! as `multipleOf: 0.01` are legitimate and JCS renders them
//! deterministically.

use serde::Serialize;

use crate::error::RegistryError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// The inner buffer is private; [`CanonicalBytes::new`] is the only
/// constructor, so every digest in the registry is computed over
/// canonical input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Serialization`] if the value cannot be
    /// represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, RegistryError> {
        let value = serde_json::to_value(obj)?;
        let s = serde_jcs::to_string(&value)
            .map_err(|e| RegistryError::Serialization(format!("JCS serialization failed: {e}")))?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical_str(v: &serde_json::Value) -> String {
        let cb = CanonicalBytes::new(v).expect("should canonicalize");
        String::from_utf8(cb.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_sorted_keys_compact() {
        let data = json!({"b": 2, "a": 1, "c": "hello"});
        assert_eq!(canonical_str(&data), r#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let data = json!({
            "properties": {"num": {"type": "string"}, "alpha": {"type": "integer"}},
            "type": "object"
        });
        assert_eq!(
            canonical_str(&data),
            r#"{"properties":{"alpha":{"type":"integer"},"num":{"type":"string"}},"type":"object"}"#
        );
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"type":"object","title":"T","required":["x"]}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{ "required": ["x"],  "title": "T", "type": "object" }"#)
                .unwrap();
        assert_eq!(
            CanonicalBytes::new(&a).unwrap(),
            CanonicalBytes::new(&b).unwrap()
        );
    }

    #[test]
    fn test_array_order_is_preserved() {
        let data = json!({"required": ["z", "a"]});
        assert_eq!(canonical_str(&data), r#"{"required":["z","a"]}"#);
    }

    #[test]
    fn test_floats_are_permitted() {
        let data = json!({"multipleOf": 0.5});
        assert_eq!(canonical_str(&data), r#"{"multipleOf":0.5}"#);
    }

    #[test]
    fn test_empty_object() {
        let cb = CanonicalBytes::new(&json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        assert!(!cb.is_empty());
        assert_eq!(cb.len(), 2);
    }

    #[test]
    fn test_unicode_passthrough() {
        let data = json!({"title": "\u{00e9}t\u{00e9}"});
        assert!(canonical_str(&data).contains('\u{00e9}'));
    }
}
