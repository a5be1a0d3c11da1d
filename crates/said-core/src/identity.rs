//! # Identifier Newtypes
//!
//! A schema record carries two identifiers: the opaque, provider-assigned
//! [`SchemaId`] and the content-derived [`Said`]. Keeping them as distinct
//! types prevents passing one where the other is expected: a `read(id)`
//! cannot silently be handed a SAID.
//!
//! Both serialize as plain JSON strings and are validated on the way in,
//! whether built with `new` or deserialized.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegistryError;

/// Reject identifiers that cannot be embedded in a URL path segment.
fn validate_identifier(kind: &str, s: &str) -> Result<(), RegistryError> {
    if s.is_empty() {
        return Err(RegistryError::InvalidInput(format!("{kind} must not be empty")));
    }
    if s.chars().any(|c| c.is_whitespace() || c == '/' || c == '?' || c == '#') {
        return Err(RegistryError::InvalidInput(format!(
            "{kind} contains characters not allowed in a path segment: {s:?}"
        )));
    }
    if s == "." || s == ".." {
        return Err(RegistryError::InvalidInput(format!(
            "{kind} must not be a dot segment: {s:?}"
        )));
    }
    Ok(())
}

/// Path segments routed under `/api/schemas/` ahead of `{id}`. A record
/// stored under one of these could never be addressed.
pub const RESERVED_SCHEMA_IDS: &[&str] = &["bulk", "sync", "export", "import", "info", "by-said"];

/// Opaque, provider-assigned schema identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaId(String);

impl SchemaId {
    /// Wrap an existing identifier, validating that it is path-safe and
    /// not one of [`RESERVED_SCHEMA_IDS`].
    pub fn new(s: impl Into<String>) -> Result<Self, RegistryError> {
        let s = s.into();
        validate_identifier("schema id", &s)?;
        if RESERVED_SCHEMA_IDS.contains(&s.as_str()) {
            return Err(RegistryError::InvalidInput(format!(
                "schema id {s:?} is reserved by the registry routes"
            )));
        }
        Ok(Self(s))
    }

    /// Generate a fresh identifier of the form `schema_<uuid>`.
    pub fn generate() -> Self {
        Self(format!("schema_{}", Uuid::new_v4().simple()))
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SchemaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SchemaId {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SchemaId> for String {
    fn from(id: SchemaId) -> Self {
        id.0
    }
}

/// Self-addressing identifier: the qualified content digest of a schema body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Said(String);

impl Said {
    /// Wrap an existing qualified digest string.
    pub fn new(s: impl Into<String>) -> Result<Self, RegistryError> {
        let s = s.into();
        validate_identifier("SAID", &s)?;
        Ok(Self(s))
    }

    /// Digest output is path-safe by construction.
    pub(crate) fn from_digest(s: String) -> Self {
        Self(s)
    }

    /// Return the SAID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the newtype, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Said {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Said {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Said {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Said> for String {
    fn from(said: Said) -> Self {
        said.0
    }
}

impl PartialEq<str> for Said {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Said {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = SchemaId::generate();
        let b = SchemaId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("schema_"));
        assert!(SchemaId::new(a.as_str()).is_ok());
    }

    #[test]
    fn empty_identifiers_rejected() {
        assert!(SchemaId::new("").is_err());
        assert!(Said::new("").is_err());
    }

    #[test]
    fn path_breaking_characters_rejected() {
        assert!(Said::new("abc/def").is_err());
        assert!(SchemaId::new("has space").is_err());
        assert!(SchemaId::new("q?x=1").is_err());
    }

    #[test]
    fn route_words_and_dot_segments_rejected() {
        for word in RESERVED_SCHEMA_IDS {
            assert!(SchemaId::new(*word).is_err(), "{word} must be rejected");
        }
        assert!(SchemaId::new(".").is_err());
        assert!(SchemaId::new("..").is_err());
        assert!(Said::new("..").is_err());
        // Only exact matches are reserved.
        assert!(SchemaId::new("bulk_import").is_ok());
        assert!(SchemaId::new("schema.v2").is_ok());
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<SchemaId>(r#""sync""#).is_err());
        assert!(serde_json::from_str::<SchemaId>(r#""a/b""#).is_err());
        assert!(serde_json::from_str::<Said>(r#""""#).is_err());
        let id: SchemaId = serde_json::from_str(r#""schema_1""#).unwrap();
        assert_eq!(id.as_str(), "schema_1");
    }

    #[test]
    fn serializes_as_plain_string() {
        let said = Said::new("IKx9").unwrap();
        assert_eq!(serde_json::to_string(&said).unwrap(), r#""IKx9""#);
        let back: Said = serde_json::from_str(r#""IKx9""#).unwrap();
        assert_eq!(back, "IKx9");
    }
}
