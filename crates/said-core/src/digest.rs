//! # Content Addressing: SAID Computation
//!
//! A SAID (self-addressing identifier) is the qualified digest of a schema
//! body computed with the body's own self-reference field (`$id`) blanked.
//! Because the field is blanked before hashing, the digest does not depend
//! on whatever value `$id` held, including the SAID itself once embedded.
//!
//! ## Digest Capability
//!
//! The actual digest primitive is an opaque capability behind
//! [`DigestCapability`]. [`Sha256Digester`] is the shipped implementation:
//! it emits a CESR-style qualified digest with derivation code `I`
//! (SHA2-256), always 44 characters long.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::RegistryError;
use crate::identity::Said;

/// Name of the self-reference field inside a JSON-Schema body.
pub const SELF_ADDRESSING_FIELD: &str = "$id";

/// The digest capability invoked by content addressing.
///
/// Implementations must be pure: the same canonical bytes always produce
/// the same identifier.
pub trait DigestCapability: Send + Sync {
    /// Compute the qualified digest of canonical bytes.
    fn compute_digest(&self, data: &CanonicalBytes) -> Said;
}

/// SHA2-256 digester producing 44-character qualified digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digester;

/// CESR derivation code for SHA2-256.
const SHA2_256_CODE: char = 'I';

impl DigestCapability for Sha256Digester {
    fn compute_digest(&self, data: &CanonicalBytes) -> Said {
        let hash = Sha256::digest(data.as_bytes());
        // One pad byte ahead of the 32 raw bytes aligns the encoding on a
        // 24-bit boundary; the leading base64 char it yields is replaced by
        // the derivation code.
        let mut padded = [0u8; 33];
        padded[1..].copy_from_slice(&hash);
        let encoded = URL_SAFE_NO_PAD.encode(padded);
        let mut qualified = String::with_capacity(encoded.len());
        qualified.push(SHA2_256_CODE);
        qualified.push_str(&encoded[1..]);
        Said::from_digest(qualified)
    }
}

/// Compute the SAID of a JSON-Schema body.
///
/// The body is copied, its [`SELF_ADDRESSING_FIELD`] set to the empty
/// string (inserted when absent), canonicalized, and digested.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidInput`] if the body is not a JSON object.
pub fn compute_said(schema: &Value, digester: &dyn DigestCapability) -> Result<Said, RegistryError> {
    let Value::Object(map) = schema else {
        return Err(RegistryError::InvalidInput(
            "Invalid schema structure for SAID computation: body must be a JSON object".into(),
        ));
    };
    let mut blanked = map.clone();
    blanked.insert(SELF_ADDRESSING_FIELD.to_string(), Value::String(String::new()));
    let canonical = CanonicalBytes::new(&Value::Object(blanked))?;
    Ok(digester.compute_digest(&canonical))
}

/// Return a copy of the body with its self-reference field set to `said`.
pub fn embed_said(schema: &Value, said: &Said) -> Value {
    let mut out = schema.clone();
    if let Value::Object(map) = &mut out {
        map.insert(
            SELF_ADDRESSING_FIELD.to_string(),
            Value::String(said.as_str().to_string()),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passport() -> Value {
        json!({"type": "object", "properties": {"num": {"type": "string"}}})
    }

    #[test]
    fn said_is_deterministic() {
        let a = compute_said(&passport(), &Sha256Digester).unwrap();
        let b = compute_said(&passport(), &Sha256Digester).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn said_is_qualified_and_44_chars() {
        let said = compute_said(&passport(), &Sha256Digester).unwrap();
        assert_eq!(said.as_str().len(), 44);
        assert!(said.as_str().starts_with('I'));
        assert!(said
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn self_reference_value_does_not_change_said() {
        let mut with_id = passport();
        with_id["$id"] = json!("something-else");
        let mut with_other = passport();
        with_other["$id"] = json!("EKYLUMmNPZeEs77Zvclf0bSN5IN-mLfLpx2ySb-HDlk4");
        let base = compute_said(&passport(), &Sha256Digester).unwrap();
        assert_eq!(compute_said(&with_id, &Sha256Digester).unwrap(), base);
        assert_eq!(compute_said(&with_other, &Sha256Digester).unwrap(), base);
    }

    #[test]
    fn embedding_the_said_is_a_fixed_point() {
        let said = compute_said(&passport(), &Sha256Digester).unwrap();
        let embedded = embed_said(&passport(), &said);
        assert_eq!(embedded["$id"], json!(said.as_str()));
        assert_eq!(compute_said(&embedded, &Sha256Digester).unwrap(), said);
    }

    #[test]
    fn structural_change_changes_said() {
        let mut other = passport();
        other["required"] = json!(["num"]);
        assert_ne!(
            compute_said(&passport(), &Sha256Digester).unwrap(),
            compute_said(&other, &Sha256Digester).unwrap()
        );
    }

    #[test]
    fn non_object_body_rejected() {
        for body in [json!([1, 2]), json!("schema"), json!(null)] {
            let err = compute_said(&body, &Sha256Digester).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidInput(_)));
        }
    }

    #[test]
    fn known_vector_for_empty_schema() {
        // Canonical form of `{}` after blanking is `{"$id":""}`.
        let said = compute_said(&json!({}), &Sha256Digester).unwrap();
        let cb = CanonicalBytes::new(&json!({"$id": ""})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"$id":""}"#);
        assert_eq!(said, Sha256Digester.compute_digest(&cb));
    }
}
