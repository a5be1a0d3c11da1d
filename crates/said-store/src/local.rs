//! # Local Provider
//!
//! Durable single-process store keyed by schema id, backed either by memory
//! or by one JSON document on disk (the [`SchemaCollection`] map format).
//!
//! ## Single-Writer Critical Section
//!
//! Every operation runs its whole load → check → write sequence while
//! holding one mutex, so two creates with colliding content cannot both
//! pass the SAID uniqueness scan. The scan is linear over all records; that
//! is a scaling limit, not a correctness one.
//!
//! ## Failure Policy
//!
//! - A backing file that cannot be read or parsed loads as an empty
//!   collection (logged at `warn`), keeping read paths available.
//! - A failed write aborts the mutation with
//!   [`RegistryError::StorageUnavailable`]. Writes go to a temp file in the
//!   same directory and are renamed into place, so a crash never leaves a
//!   half-written document behind.
//!
//! ## Blocking I/O
//!
//! The file backend reads, parses and fsyncs the whole document with
//! `std::fs`. Provider operations on a file-backed store therefore run on
//! Tokio's blocking pool via [`LocalProvider::run_blocking`]; the
//! synchronous [`snapshot`](LocalProvider::snapshot) and
//! [`replace_all`](LocalProvider::replace_all) block the calling thread and
//! should be reached through it from async code.
//!
//! ## Mutation Observers
//!
//! [`LocalProvider::subscribe`] registers callbacks invoked after every
//! successful write, once the lock has been released. For a file-backed
//! store they run on the blocking pool, inside the runtime context.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use said_core::{
    apply_query, compute_said, dedupe_tags, CreateSchemaRequest, DigestCapability, QueryDefaults,
    RegistryError, Said, SchemaCollection, SchemaData, SchemaId, SchemaMetadata, SchemaQuery,
    SchemaSearchResult, Sha256Digester, Timestamp, UpdateSchemaRequest, DEFAULT_SCHEMA_VERSION,
};

use crate::provider::{ProviderInfo, ProviderKind, StorageProvider};

type Observer = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug)]
enum Backend {
    Memory(SchemaCollection),
    File(PathBuf),
}

impl Backend {
    fn load(&self) -> SchemaCollection {
        match self {
            Self::Memory(collection) => collection.clone(),
            Self::File(path) => load_file(path),
        }
    }

    fn save(&mut self, collection: SchemaCollection) -> Result<(), RegistryError> {
        match self {
            Self::Memory(slot) => {
                *slot = collection;
                Ok(())
            }
            Self::File(path) => save_file(path, &collection),
        }
    }
}

fn load_file(path: &Path) -> SchemaCollection {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SchemaCollection::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read schema store, treating as empty");
            return SchemaCollection::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(collection) => collection,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse schema store, treating as empty");
            SchemaCollection::new()
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn save_file(path: &Path, collection: &SchemaCollection) -> Result<(), RegistryError> {
    let unavailable = |e: &dyn std::fmt::Display| {
        RegistryError::StorageUnavailable(format!("failed to save schema store {}: {e}", path.display()))
    };
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir).map_err(|e| unavailable(&e))?;
    let bytes = serde_json::to_vec_pretty(collection)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| unavailable(&e))?;
    tmp.write_all(&bytes).map_err(|e| unavailable(&e))?;
    tmp.as_file().sync_all().map_err(|e| unavailable(&e))?;
    tmp.persist(path).map_err(|e| unavailable(&e.error))?;
    Ok(())
}

struct LocalInner {
    backend: Mutex<Backend>,
    file_backed: bool,
    observers: RwLock<Vec<Observer>>,
    digester: Arc<dyn DigestCapability>,
}

/// Local, durable schema store.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct LocalProvider {
    inner: Arc<LocalInner>,
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("backend", &*self.inner.backend.lock())
            .field("observers", &self.inner.observers.read().len())
            .finish()
    }
}

impl LocalProvider {
    fn with_backend(backend: Backend, digester: Arc<dyn DigestCapability>) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                file_backed: matches!(backend, Backend::File(_)),
                backend: Mutex::new(backend),
                observers: RwLock::new(Vec::new()),
                digester,
            }),
        }
    }

    /// Volatile store, lost on drop.
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory(SchemaCollection::new()), Arc::new(Sha256Digester))
    }

    /// Store persisted to the JSON document at `path`. The file is created
    /// on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(Backend::File(path.into()), Arc::new(Sha256Digester))
    }

    /// Replace the digest capability used for content addressing.
    pub fn with_digester(self, digester: Arc<dyn DigestCapability>) -> Self {
        let backend = match &*self.inner.backend.lock() {
            Backend::Memory(c) => Backend::Memory(c.clone()),
            Backend::File(p) => Backend::File(p.clone()),
        };
        Self::with_backend(backend, digester)
    }

    /// Path of the backing document, if file-backed.
    pub fn path(&self) -> Option<PathBuf> {
        match &*self.inner.backend.lock() {
            Backend::File(path) => Some(path.clone()),
            Backend::Memory(_) => None,
        }
    }

    /// A handle that does not keep the store alive, for observers that
    /// need to reach back into it.
    pub fn downgrade(&self) -> WeakLocalProvider {
        WeakLocalProvider {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a callback run after every successful write.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.observers.write().push(Arc::new(observer));
    }

    /// The entire stored collection.
    pub fn snapshot(&self) -> SchemaCollection {
        self.read_with(|c| c.clone())
    }

    /// Replace the stored collection wholesale, returning its size.
    ///
    /// Every record's SAID is recomputed from its body. A mismatch, or a
    /// SAID carried by two records, rejects the whole collection with
    /// [`RegistryError::InvalidInput`] and leaves the store untouched.
    pub fn replace_all(&self, collection: SchemaCollection) -> Result<usize, RegistryError> {
        self.mutate(|stored| {
            self.verify_collection(&collection)?;
            *stored = collection;
            Ok((stored.len(), true))
        })
    }

    fn verify_collection(&self, collection: &SchemaCollection) -> Result<(), RegistryError> {
        let mut seen = HashSet::with_capacity(collection.len());
        for record in collection.iter() {
            let SchemaMetadata { id, said, .. } = &record.metadata;
            let computed = self.compute_said(&record.json_schema)?;
            if &computed != said {
                return Err(RegistryError::InvalidInput(format!(
                    "schema {id}: SAID {said} does not match its body (computed {computed})"
                )));
            }
            if !seen.insert(said) {
                return Err(RegistryError::InvalidInput(format!(
                    "SAID {said} is carried by more than one schema"
                )));
            }
        }
        Ok(())
    }

    /// Run `f` against this store, on the blocking pool when file-backed.
    /// In-memory stores run `f` inline.
    pub async fn run_blocking<R, F>(&self, f: F) -> Result<R, RegistryError>
    where
        R: Send + 'static,
        F: FnOnce(&LocalProvider) -> Result<R, RegistryError> + Send + 'static,
    {
        if !self.inner.file_backed {
            return f(self);
        }
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| RegistryError::StorageUnavailable(format!("schema store task failed: {e}")))?
    }

    fn compute_said(&self, body: &Value) -> Result<Said, RegistryError> {
        compute_said(body, self.inner.digester.as_ref())
    }

    fn insert_new(
        &self,
        said: Said,
        now: Timestamp,
        request: CreateSchemaRequest,
    ) -> Result<SchemaData, RegistryError> {
        self.mutate(|collection| {
            if collection.find_by_said(&said).is_some() {
                return Err(RegistryError::Conflict {
                    said: said.to_string(),
                });
            }
            let record = SchemaData {
                metadata: SchemaMetadata {
                    id: SchemaId::generate(),
                    said,
                    name: request.name,
                    description: request.description,
                    version: DEFAULT_SCHEMA_VERSION.to_string(),
                    created_at: now,
                    updated_at: now,
                    created_by: request.created_by,
                    tags: dedupe_tags(request.tags.unwrap_or_default()),
                    is_public: request.is_public.unwrap_or(false),
                },
                json_schema: request.json_schema,
                fields: request.fields.unwrap_or_default(),
            };
            collection.upsert(record.clone());
            Ok((record, true))
        })
    }

    fn apply_update(
        &self,
        id: &SchemaId,
        new_said: Option<Said>,
        request: UpdateSchemaRequest,
    ) -> Result<SchemaData, RegistryError> {
        self.mutate(|collection| {
            let mut record = collection
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

            if let Some(said) = new_said {
                if collection.said_taken_by_other(&said, Some(id)) {
                    return Err(RegistryError::Conflict {
                        said: said.to_string(),
                    });
                }
                record.metadata.said = said;
            }
            if let Some(body) = request.json_schema {
                record.json_schema = body;
            }
            if let Some(name) = request.name {
                record.metadata.name = name;
            }
            if let Some(description) = request.description {
                record.metadata.description = Some(description);
            }
            if let Some(fields) = request.fields {
                record.fields = fields;
            }
            if let Some(tags) = request.tags {
                record.metadata.tags = dedupe_tags(tags);
            }
            if let Some(is_public) = request.is_public {
                record.metadata.is_public = is_public;
            }
            record.metadata.updated_at = Timestamp::after(record.metadata.updated_at);

            collection.upsert(record.clone());
            Ok((record, true))
        })
    }

    fn read_with<R>(&self, f: impl FnOnce(&SchemaCollection) -> R) -> R {
        let backend = self.inner.backend.lock();
        f(&backend.load())
    }

    /// Run `f` inside the critical section. `f` reports whether it changed
    /// the collection; only then is it written back and observers notified.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut SchemaCollection) -> Result<(R, bool), RegistryError>,
    ) -> Result<R, RegistryError> {
        let (value, changed) = {
            let mut backend = self.inner.backend.lock();
            let mut collection = backend.load();
            let (value, changed) = f(&mut collection)?;
            if changed {
                backend.save(collection)?;
            }
            (value, changed)
        };
        if changed {
            self.notify();
        }
        Ok(value)
    }

    fn notify(&self) {
        let observers: Vec<Observer> = self.inner.observers.read().clone();
        for observer in observers {
            observer();
        }
    }
}

/// Non-owning handle to a [`LocalProvider`].
#[derive(Clone)]
pub struct WeakLocalProvider {
    inner: Weak<LocalInner>,
}

impl WeakLocalProvider {
    pub fn upgrade(&self) -> Option<LocalProvider> {
        self.inner.upgrade().map(|inner| LocalProvider { inner })
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    async fn create(&self, request: CreateSchemaRequest) -> Result<SchemaData, RegistryError> {
        request.validate()?;
        let said = self.compute_said(&request.json_schema)?;
        let now = Timestamp::now();

        let record = self
            .run_blocking(move |store| store.insert_new(said, now, request))
            .await?;

        tracing::info!(id = %record.metadata.id, said = %record.metadata.said, name = %record.metadata.name, "created schema");
        Ok(record)
    }

    async fn read(&self, id: &SchemaId) -> Result<Option<SchemaData>, RegistryError> {
        let id = id.clone();
        self.run_blocking(move |store| Ok(store.read_with(|c| c.get(&id).cloned())))
            .await
    }

    async fn read_by_said(&self, said: &Said) -> Result<Option<SchemaData>, RegistryError> {
        let said = said.clone();
        self.run_blocking(move |store| Ok(store.read_with(|c| c.find_by_said(&said).cloned())))
            .await
    }

    async fn update(
        &self,
        id: &SchemaId,
        request: UpdateSchemaRequest,
    ) -> Result<SchemaData, RegistryError> {
        request.validate()?;
        let new_said = request
            .json_schema
            .as_ref()
            .map(|body| self.compute_said(body))
            .transpose()?;

        let id = id.clone();
        let record = self
            .run_blocking(move |store| store.apply_update(&id, new_said, request))
            .await?;

        tracing::info!(id = %record.metadata.id, said = %record.metadata.said, "updated schema");
        Ok(record)
    }

    async fn delete(&self, id: &SchemaId) -> Result<bool, RegistryError> {
        let target = id.clone();
        let removed = self
            .run_blocking(move |store| {
                store.mutate(|collection| {
                    let removed = collection.remove(&target);
                    let changed = removed.is_some();
                    Ok((removed, changed))
                })
            })
            .await?;
        match removed {
            Some(record) => {
                tracing::info!(id = %id, name = %record.metadata.name, "deleted schema");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, query: &SchemaQuery) -> Result<SchemaSearchResult, RegistryError> {
        let query = query.clone();
        self.run_blocking(move |store| {
            Ok(store.read_with(|c| apply_query(c.iter().cloned(), &query, QueryDefaults::LOCAL)))
        })
        .await
    }

    async fn exists(&self, said: &Said) -> Result<bool, RegistryError> {
        let said = said.clone();
        self.run_blocking(move |store| Ok(store.read_with(|c| c.find_by_said(&said).is_some())))
            .await
    }

    async fn bulk_create(
        &self,
        requests: Vec<CreateSchemaRequest>,
    ) -> Result<Vec<SchemaData>, RegistryError> {
        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            let name = request.name.clone();
            match self.create(request).await {
                Ok(record) => created.push(record),
                Err(e) => {
                    tracing::error!(name = %name, created = created.len(), error = %e, "bulk create aborted");
                    return Err(e);
                }
            }
        }
        Ok(created)
    }

    async fn bulk_delete(&self, ids: &[SchemaId]) -> Result<Vec<bool>, RegistryError> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let deleted = match self.delete(id).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "bulk delete entry failed");
                    false
                }
            };
            results.push(deleted);
        }
        Ok(results)
    }

    async fn get_schema_for_oobi(&self, said: &Said) -> Result<Option<Value>, RegistryError> {
        let said = said.clone();
        self.run_blocking(move |store| {
            Ok(store.read_with(|c| c.find_by_said(&said).map(|r| r.json_schema.clone())))
        })
        .await
    }

    async fn is_available(&self) -> bool {
        let path = match &*self.inner.backend.lock() {
            Backend::Memory(_) => return true,
            Backend::File(path) => path.clone(),
        };
        self.run_blocking(move |_| {
            let dir = parent_dir(&path);
            std::fs::create_dir_all(dir)
                .and_then(|()| tempfile::NamedTempFile::new_in(dir))
                .map(drop)
                .map_err(|e| RegistryError::StorageUnavailable(e.to_string()))
        })
        .await
        .is_ok()
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "Local Schema Provider".to_string(),
            kind: ProviderKind::Local,
            version: DEFAULT_SCHEMA_VERSION.to_string(),
            capabilities: [
                "create",
                "read",
                "update",
                "delete",
                "list",
                "search",
                "bulk_operations",
                "oobi",
                "offline_access",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}
