//! # Schema Service: Fallback Orchestrator
//!
//! Wraps one primary provider and at most one fallback. Every CRUD/query
//! operation runs against the primary first; on any error, the identical
//! operation is retried against the fallback, whose outcome (success or
//! error) becomes final. Without a fallback the primary's error propagates
//! unchanged. Errors are never downgraded to empty results.
//!
//! The fallback is not a cache: nothing reconciles primary and fallback
//! state. Use [`SchemaService::export_schemas`] /
//! [`SchemaService::import_schemas`] to copy data between them.
//!
//! The service is constructed once at startup and shared by reference
//! (`Arc<SchemaService>`); there is no global instance.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use said_core::{
    with_timeout, CreateSchemaRequest, RegistryError, Said, SchemaData, SchemaId, SchemaQuery,
    SchemaSearchResult, SortBy, SortOrder, Timestamp, UpdateSchemaRequest,
};

use crate::local::LocalProvider;
use crate::provider::{Provider, ProviderConfig, ProviderInfo, ProviderKind, StorageProvider};

/// Upper bound on a single availability probe in [`SchemaService::get_health_status`].
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Page size used when exporting the full registry.
const EXPORT_PAGE_SIZE: usize = 100;

/// Format version stamped on exports.
pub const EXPORT_VERSION: &str = "1.0.0";

/// Service construction parameters.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub provider: ProviderConfig,
    /// Install an in-memory Local Provider as fallback. Ignored when the
    /// primary is itself Local.
    pub fallback_to_local: bool,
}

impl ServiceConfig {
    /// In-memory local primary, no fallback.
    pub fn local() -> Self {
        Self {
            provider: ProviderConfig::Local { path: None },
            fallback_to_local: false,
        }
    }
}

/// Options for [`SchemaService::search_schemas`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Defaults to 20.
    pub limit: Option<usize>,
    pub tags: Option<Vec<String>>,
}

/// Availability report for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub available: bool,
    pub info: ProviderInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Combined availability of primary and fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub primary: ProviderHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ProviderHealth>,
}

/// Full-registry export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaExport {
    pub schemas: Vec<SchemaData>,
    pub exported_at: Timestamp,
    pub version: String,
}

/// Outcome of [`SchemaService::import_schemas`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

struct Primary {
    provider: Arc<dyn StorageProvider>,
    /// Set when the primary is a configured Local Provider.
    local: Option<LocalProvider>,
}

/// Fallback-aware facade over the storage providers.
pub struct SchemaService {
    primary: RwLock<Primary>,
    fallback: Option<Arc<dyn StorageProvider>>,
}

impl std::fmt::Debug for SchemaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaService")
            .field("primary", &self.primary.read().provider.provider_info().name)
            .field(
                "fallback",
                &self.fallback.as_ref().map(|p| p.provider_info().name),
            )
            .finish()
    }
}

fn configured(config: &ProviderConfig) -> Result<Primary, RegistryError> {
    let provider = Provider::from_config(config)?;
    let local = provider.as_local().cloned();
    Ok(Primary {
        provider: Arc::new(provider),
        local,
    })
}

impl SchemaService {
    /// Build the configured primary and, when requested, a local fallback.
    pub fn new(config: &ServiceConfig) -> Result<Self, RegistryError> {
        let primary = configured(&config.provider)?;
        let fallback: Option<Arc<dyn StorageProvider>> =
            if config.fallback_to_local && config.provider.kind() != ProviderKind::Local {
                Some(Arc::new(LocalProvider::in_memory()))
            } else {
                None
            };
        tracing::info!(
            primary = %primary.provider.provider_info().kind,
            fallback = fallback.is_some(),
            "schema service initialized"
        );
        Ok(Self {
            primary: RwLock::new(primary),
            fallback,
        })
    }

    /// Assemble a service from already-constructed providers.
    pub fn with_providers(
        primary: Arc<dyn StorageProvider>,
        fallback: Option<Arc<dyn StorageProvider>>,
    ) -> Self {
        Self {
            primary: RwLock::new(Primary {
                provider: primary,
                local: None,
            }),
            fallback,
        }
    }

    /// Service over an existing Local Provider handle, no fallback.
    pub fn from_local(local: LocalProvider) -> Self {
        Self {
            primary: RwLock::new(Primary {
                provider: Arc::new(local.clone()),
                local: Some(local),
            }),
            fallback: None,
        }
    }

    fn primary(&self) -> Arc<dyn StorageProvider> {
        self.primary.read().provider.clone()
    }

    /// The primary as a Local Provider, when it is one.
    pub fn local_primary(&self) -> Option<LocalProvider> {
        self.primary.read().local.clone()
    }

    /// Replace the primary provider. The fallback is left as it is.
    pub fn switch_provider(&self, config: &ProviderConfig) -> Result<(), RegistryError> {
        let next = configured(config)?;
        tracing::info!(primary = %config.kind(), "switching primary provider");
        *self.primary.write() = next;
        Ok(())
    }

    async fn execute<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, RegistryError>
    where
        F: Fn(Arc<dyn StorageProvider>) -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        let err = match op(self.primary()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let Some(fallback) = self.fallback.clone() else {
            return Err(err);
        };
        tracing::warn!(operation, error = %err, "primary provider failed, trying fallback");
        op(fallback).await.map_err(|fallback_err| {
            tracing::error!(operation, error = %fallback_err, "fallback provider also failed");
            fallback_err
        })
    }

    pub async fn create_schema(&self, request: CreateSchemaRequest) -> Result<SchemaData, RegistryError> {
        self.execute("create_schema", |p| {
            let request = request.clone();
            async move { p.create(request).await }
        })
        .await
    }

    pub async fn get_schema(&self, id: &SchemaId) -> Result<Option<SchemaData>, RegistryError> {
        self.execute("get_schema", |p| async move { p.read(id).await }).await
    }

    pub async fn get_schema_by_said(&self, said: &Said) -> Result<Option<SchemaData>, RegistryError> {
        self.execute("get_schema_by_said", |p| async move { p.read_by_said(said).await })
            .await
    }

    pub async fn update_schema(
        &self,
        id: &SchemaId,
        request: UpdateSchemaRequest,
    ) -> Result<SchemaData, RegistryError> {
        self.execute("update_schema", |p| {
            let request = request.clone();
            async move { p.update(id, request).await }
        })
        .await
    }

    pub async fn delete_schema(&self, id: &SchemaId) -> Result<bool, RegistryError> {
        self.execute("delete_schema", |p| async move { p.delete(id).await }).await
    }

    pub async fn list_schemas(&self, query: &SchemaQuery) -> Result<SchemaSearchResult, RegistryError> {
        self.execute("list_schemas", |p| async move { p.list(query).await }).await
    }

    pub async fn schema_exists(&self, said: &Said) -> Result<bool, RegistryError> {
        self.execute("schema_exists", |p| async move { p.exists(said).await }).await
    }

    pub async fn bulk_create_schemas(
        &self,
        requests: Vec<CreateSchemaRequest>,
    ) -> Result<Vec<SchemaData>, RegistryError> {
        self.execute("bulk_create_schemas", |p| {
            let requests = requests.clone();
            async move { p.bulk_create(requests).await }
        })
        .await
    }

    pub async fn bulk_delete_schemas(&self, ids: &[SchemaId]) -> Result<Vec<bool>, RegistryError> {
        self.execute("bulk_delete_schemas", |p| async move { p.bulk_delete(ids).await })
            .await
    }

    pub async fn get_schema_for_oobi(&self, said: &Said) -> Result<Option<Value>, RegistryError> {
        self.execute("get_schema_for_oobi", |p| async move {
            p.get_schema_for_oobi(said).await
        })
        .await
    }

    pub async fn is_provider_available(&self) -> bool {
        self.primary().is_available().await
    }

    pub async fn is_fallback_available(&self) -> bool {
        match &self.fallback {
            Some(fallback) => fallback.is_available().await,
            None => false,
        }
    }

    pub fn provider_info(&self) -> ProviderInfo {
        self.primary().provider_info()
    }

    pub fn fallback_provider_info(&self) -> Option<ProviderInfo> {
        self.fallback.as_ref().map(|p| p.provider_info())
    }

    /// Probe both providers independently and concurrently.
    pub async fn get_health_status(&self) -> HealthStatus {
        let primary = self.primary();
        let fallback = self.fallback.clone();
        let (primary, fallback) = tokio::join!(probe(primary), async move {
            match fallback {
                Some(p) => Some(probe(p).await),
                None => None,
            }
        });
        HealthStatus { primary, fallback }
    }

    /// Name/description search, sorted by name ascending.
    pub async fn search_schemas(
        &self,
        term: &str,
        options: SearchOptions,
    ) -> Result<Vec<SchemaData>, RegistryError> {
        let query = SchemaQuery {
            search: Some(term.to_string()),
            tags: options.tags,
            limit: Some(options.limit.unwrap_or(20)),
            sort_by: Some(SortBy::Name),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        Ok(self.list_schemas(&query).await?.schemas)
    }

    /// Records carrying at least one of `tags`.
    pub async fn get_schemas_by_tags(&self, tags: &[String]) -> Result<Vec<SchemaData>, RegistryError> {
        let query = SchemaQuery {
            tags: Some(tags.to_vec()),
            ..Default::default()
        };
        Ok(self.list_schemas(&query).await?.schemas)
    }

    /// Most recently created records first.
    pub async fn get_recent_schemas(&self, limit: usize) -> Result<Vec<SchemaData>, RegistryError> {
        let query = SchemaQuery {
            limit: Some(limit),
            sort_by: Some(SortBy::CreatedAt),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        };
        Ok(self.list_schemas(&query).await?.schemas)
    }

    /// Page through the whole registry, oldest first.
    pub async fn export_schemas(&self) -> Result<SchemaExport, RegistryError> {
        let mut schemas = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .list_schemas(&SchemaQuery {
                    limit: Some(EXPORT_PAGE_SIZE),
                    offset: Some(offset),
                    sort_by: Some(SortBy::CreatedAt),
                    sort_order: Some(SortOrder::Asc),
                    ..Default::default()
                })
                .await?;
            let fetched = page.schemas.len();
            schemas.extend(page.schemas);
            if !page.has_more || fetched == 0 {
                break;
            }
            offset += fetched;
        }
        tracing::info!(count = schemas.len(), "exported schemas");
        Ok(SchemaExport {
            schemas,
            exported_at: Timestamp::now(),
            version: EXPORT_VERSION.to_string(),
        })
    }

    /// Create every record whose SAID is not yet present. A failing record
    /// is reported in `errors` and does not stop the batch.
    pub async fn import_schemas(&self, export: &SchemaExport) -> ImportReport {
        let mut report = ImportReport::default();
        for data in &export.schemas {
            let outcome = async {
                if self.schema_exists(&data.metadata.said).await? {
                    return Ok(false);
                }
                self.create_schema(CreateSchemaRequest::from(data)).await?;
                Ok::<_, RegistryError>(true)
            }
            .await;
            match outcome {
                Ok(true) => report.imported += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => report
                    .errors
                    .push(format!("Failed to import {}: {e}", data.metadata.name)),
            }
        }
        tracing::info!(
            imported = report.imported,
            skipped = report.skipped,
            failed = report.errors.len(),
            "imported schemas"
        );
        report
    }
}

async fn probe(provider: Arc<dyn StorageProvider>) -> ProviderHealth {
    let info = provider.provider_info();
    let probe = async { Ok(provider.is_available().await) };
    match with_timeout(probe, PROBE_TIMEOUT, "availability probe timed out").await {
        Ok(available) => ProviderHealth {
            available,
            info,
            error: None,
        },
        Err(e) => ProviderHealth {
            available: false,
            info,
            error: Some(e.to_string()),
        },
    }
}
