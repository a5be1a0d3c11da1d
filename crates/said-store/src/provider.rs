//! # Storage Provider Contract
//!
//! [`StorageProvider`] is the one contract every backend honours. The two
//! shipped variants are collected in the tagged [`Provider`] enum, selected
//! at construction time by an explicit [`ProviderConfig`] value.
//!
//! ## Absent Results
//!
//! `read`, `read_by_said`, `exists`, `delete`, and `get_schema_for_oobi`
//! report an unknown key as `None` / `false`. Only `update` raises
//! [`RegistryError::NotFound`].
//!
//! ## Bulk Semantics
//!
//! - `bulk_create` is sequential and aborts on the first error. Records
//!   created before the failure stay persisted; the error is returned.
//! - `bulk_delete` is best-effort: one result per input id, in order, and a
//!   failure on one id is reported as `false` without aborting the batch.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use said_core::{
    CreateSchemaRequest, RegistryError, Said, SchemaData, SchemaId, SchemaQuery,
    SchemaSearchResult, UpdateSchemaRequest,
};

use crate::local::LocalProvider;
use crate::remote::{RemoteConfig, RemoteProvider};

/// Provider variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Remote,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Identifying information reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub version: String,
    pub capabilities: Vec<String>,
}

/// CRUD, query, and OOBI contract implemented identically by every backend.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Compute the SAID, enforce uniqueness, and persist a new record.
    async fn create(&self, request: CreateSchemaRequest) -> Result<SchemaData, RegistryError>;

    async fn read(&self, id: &SchemaId) -> Result<Option<SchemaData>, RegistryError>;

    async fn read_by_said(&self, said: &Said) -> Result<Option<SchemaData>, RegistryError>;

    /// Apply a partial update. Fails with `NotFound` for an unknown id and
    /// with `Conflict` when a changed body collides with another record.
    async fn update(
        &self,
        id: &SchemaId,
        request: UpdateSchemaRequest,
    ) -> Result<SchemaData, RegistryError>;

    /// Hard delete. `false` when the id is unknown.
    async fn delete(&self, id: &SchemaId) -> Result<bool, RegistryError>;

    /// Filter → sort → paginate.
    async fn list(&self, query: &SchemaQuery) -> Result<SchemaSearchResult, RegistryError>;

    async fn exists(&self, said: &Said) -> Result<bool, RegistryError>;

    async fn bulk_create(
        &self,
        requests: Vec<CreateSchemaRequest>,
    ) -> Result<Vec<SchemaData>, RegistryError>;

    async fn bulk_delete(&self, ids: &[SchemaId]) -> Result<Vec<bool>, RegistryError>;

    /// The raw JSON-Schema body, never the metadata envelope.
    async fn get_schema_for_oobi(&self, said: &Said) -> Result<Option<Value>, RegistryError>;

    /// Cheap liveness probe. Never fails.
    async fn is_available(&self) -> bool;

    fn provider_info(&self) -> ProviderInfo;
}

/// Explicit configuration value selecting a provider variant.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// File-backed when `path` is set, in-memory otherwise.
    Local { path: Option<PathBuf> },
    Remote(RemoteConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Local { .. } => ProviderKind::Local,
            Self::Remote(_) => ProviderKind::Remote,
        }
    }
}

/// Tagged provider variant.
#[derive(Debug, Clone)]
pub enum Provider {
    Local(LocalProvider),
    Remote(RemoteProvider),
}

impl Provider {
    /// Construct the variant named by `config`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, RegistryError> {
        match config {
            ProviderConfig::Local { path: Some(path) } => {
                Ok(Self::Local(LocalProvider::open(path.clone())))
            }
            ProviderConfig::Local { path: None } => Ok(Self::Local(LocalProvider::in_memory())),
            ProviderConfig::Remote(remote) => Ok(Self::Remote(RemoteProvider::new(remote.clone())?)),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Local(_) => ProviderKind::Local,
            Self::Remote(_) => ProviderKind::Remote,
        }
    }

    /// The local variant, if this is one.
    pub fn as_local(&self) -> Option<&LocalProvider> {
        match self {
            Self::Local(local) => Some(local),
            Self::Remote(_) => None,
        }
    }

    fn inner(&self) -> &dyn StorageProvider {
        match self {
            Self::Local(p) => p,
            Self::Remote(p) => p,
        }
    }
}

#[async_trait]
impl StorageProvider for Provider {
    async fn create(&self, request: CreateSchemaRequest) -> Result<SchemaData, RegistryError> {
        self.inner().create(request).await
    }

    async fn read(&self, id: &SchemaId) -> Result<Option<SchemaData>, RegistryError> {
        self.inner().read(id).await
    }

    async fn read_by_said(&self, said: &Said) -> Result<Option<SchemaData>, RegistryError> {
        self.inner().read_by_said(said).await
    }

    async fn update(
        &self,
        id: &SchemaId,
        request: UpdateSchemaRequest,
    ) -> Result<SchemaData, RegistryError> {
        self.inner().update(id, request).await
    }

    async fn delete(&self, id: &SchemaId) -> Result<bool, RegistryError> {
        self.inner().delete(id).await
    }

    async fn list(&self, query: &SchemaQuery) -> Result<SchemaSearchResult, RegistryError> {
        self.inner().list(query).await
    }

    async fn exists(&self, said: &Said) -> Result<bool, RegistryError> {
        self.inner().exists(said).await
    }

    async fn bulk_create(
        &self,
        requests: Vec<CreateSchemaRequest>,
    ) -> Result<Vec<SchemaData>, RegistryError> {
        self.inner().bulk_create(requests).await
    }

    async fn bulk_delete(&self, ids: &[SchemaId]) -> Result<Vec<bool>, RegistryError> {
        self.inner().bulk_delete(ids).await
    }

    async fn get_schema_for_oobi(&self, said: &Said) -> Result<Option<Value>, RegistryError> {
        self.inner().get_schema_for_oobi(said).await
    }

    async fn is_available(&self) -> bool {
        self.inner().is_available().await
    }

    fn provider_info(&self) -> ProviderInfo {
        self.inner().provider_info()
    }
}
