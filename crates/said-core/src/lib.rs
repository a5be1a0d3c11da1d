//! # said-core: Foundational Types for the SAID Schema Registry
//!
//! The registry stores JSON-Schema documents addressed by a content-derived
//! self-addressing identifier (SAID) and serves them for OOBI resolution.
//! This crate holds everything the storage providers and the HTTP surface
//! agree on; it performs no I/O beyond timer waits.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** All digest input flows through
//!    `CanonicalBytes::new()` (RFC 8785). Key order and whitespace never
//!    affect a SAID.
//!
//! 2. **Opaque digest capability.** `compute_said()` blanks the `$id`
//!    self-reference field and hands canonical bytes to a
//!    [`DigestCapability`]; the primitive itself is swappable.
//!
//! 3. **Distinct identifier types.** [`SchemaId`] (opaque, provider-assigned)
//!    and [`Said`] (content-derived) cannot be confused.
//!
//! 4. **One error taxonomy.** [`RegistryError`] is shared by every layer;
//!    "absent" is an `Option`, not an error.
//!
//! ## Crate Policy
//!
//! - Leaf of the workspace DAG: no dependencies on other `said-*` crates.
//! - No `unsafe` code; no `.unwrap()` outside tests.

pub mod canonical;
pub mod collection;
pub mod digest;
pub mod error;
pub mod identity;
pub mod query;
pub mod retry;
pub mod schema;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use collection::SchemaCollection;
pub use digest::{compute_said, embed_said, DigestCapability, Sha256Digester, SELF_ADDRESSING_FIELD};
pub use error::{RegistryError, Result};
pub use identity::{Said, SchemaId, RESERVED_SCHEMA_IDS};
pub use query::{apply_query, QueryDefaults, SchemaQuery, SchemaSearchResult, SortBy, SortOrder};
pub use retry::{eventually, with_timeout, EventuallyOptions};
pub use schema::{
    dedupe_tags, CreateSchemaRequest, CredentialField, FieldType, FieldValidation, SchemaData,
    SchemaMetadata, UpdateSchemaRequest, DEFAULT_SCHEMA_VERSION,
};
pub use temporal::Timestamp;
