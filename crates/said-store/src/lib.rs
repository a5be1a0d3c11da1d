//! # said-store: Storage Providers for the SAID Schema Registry
//!
//! - [`StorageProvider`]: the CRUD/query/OOBI contract.
//! - [`LocalProvider`]: in-memory or single-file store with a single-writer
//!   critical section and mutation observers.
//! - [`RemoteProvider`]: the same contract over HTTP with per-call timeout
//!   and attempt-budget retry.
//! - [`Provider`]: tagged `{Local, Remote}` variant built from a
//!   [`ProviderConfig`].
//! - [`SchemaService`]: primary/fallback orchestrator with search,
//!   export/import, and health aggregation.
//! - [`SchemaSync`]: one-way snapshot push to a remote instance.

pub mod local;
pub mod provider;
pub mod remote;
pub mod service;
pub mod sync;

pub use local::{LocalProvider, WeakLocalProvider};
pub use provider::{Provider, ProviderConfig, ProviderInfo, ProviderKind, StorageProvider};
pub use remote::{PingResult, RemoteConfig, RemoteProvider};
pub use service::{
    HealthStatus, ImportReport, ProviderHealth, SchemaExport, SchemaService, SearchOptions,
    ServiceConfig, EXPORT_VERSION,
};
pub use sync::{SchemaSync, SyncReport, SyncStatus, DEBOUNCE, INITIAL_SYNC_DELAY};
