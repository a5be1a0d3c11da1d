//! # Schema Sync: One-Way Push to a Remote Registry
//!
//! Reads the entire local snapshot and posts it to the remote's
//! `/api/schemas/sync` endpoint, which replaces the remote's stored state
//! wholesale. There is no merge.
//!
//! Pushes are triggered by a mutation observer on the [`LocalProvider`]
//! (debounced) or once after a startup delay. Remote unavailability is a
//! soft failure: it is logged and reported in [`SyncReport`], never raised
//! to whoever triggered the push.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use said_core::{with_timeout, RegistryError, SchemaCollection, SchemaData, Timestamp};

use crate::local::LocalProvider;
use crate::remote::validate_base_url;

/// Quiet period after a mutation before a push starts.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Default delay before the startup push.
pub const INITIAL_SYNC_DELAY: Duration = Duration::from_secs(1);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    /// Records the remote reports as stored.
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Local vs. remote overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub server_available: bool,
    pub local_schemas: usize,
    pub server_schemas: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<Timestamp>,
}

#[derive(Deserialize)]
struct SyncResponse {
    synced: usize,
}

#[derive(Deserialize)]
struct ServerListing {
    #[serde(default)]
    schemas: Vec<SchemaData>,
}

#[derive(Deserialize)]
struct ServerError {
    error: Option<String>,
}

struct SyncState {
    last_sync: Mutex<Option<Timestamp>>,
    generation: AtomicU64,
}

/// Push client for a remote registry instance.
#[derive(Clone)]
pub struct SchemaSync {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    state: Arc<SyncState>,
}

impl std::fmt::Debug for SchemaSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSync")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("last_sync", &*self.state.last_sync.lock())
            .finish()
    }
}

impl SchemaSync {
    /// `base_url` is the remote server root (the one serving `/health`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, RegistryError> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RegistryError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            state: Arc::new(SyncState {
                last_sync: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        })
    }

    /// Per-request deadline (default 10s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Time of the last successful push.
    pub fn last_sync(&self) -> Option<Timestamp> {
        *self.state.last_sync.lock()
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, RegistryError> {
        let url = format!("{}{}", self.base_url, path);
        let send = async {
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| RegistryError::Transport(format!("{url}: {e}")))
        };
        with_timeout(send, self.timeout, format!("GET {url} timed out")).await
    }

    /// `GET /health` answered with a 2xx.
    pub async fn is_server_available(&self) -> bool {
        match self.get("/health").await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(base_url = %self.base_url, error = %e, "sync server not available");
                false
            }
        }
    }

    /// Push `snapshot`, replacing the remote's collection.
    pub async fn sync_to_server(&self, snapshot: &SchemaCollection) -> SyncReport {
        match self.push(snapshot).await {
            Ok(count) => {
                *self.state.last_sync.lock() = Some(Timestamp::now());
                tracing::info!(count, base_url = %self.base_url, "schemas synced to server");
                SyncReport {
                    success: true,
                    count,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(base_url = %self.base_url, error = %e, "failed to sync schemas to server");
                SyncReport {
                    success: false,
                    count: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn push(&self, snapshot: &SchemaCollection) -> Result<usize, RegistryError> {
        let url = format!("{}/api/schemas/sync", self.base_url);
        let send = async {
            let response = self
                .client
                .post(&url)
                .json(snapshot)
                .send()
                .await
                .map_err(|e| RegistryError::Transport(format!("{url}: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ServerError>(&text)
                    .ok()
                    .and_then(|b| b.error)
                    .unwrap_or_else(|| "Sync failed".to_string());
                return Err(RegistryError::RemoteError {
                    status: status.as_u16(),
                    body: message,
                });
            }
            let body: SyncResponse = response
                .json()
                .await
                .map_err(|e| RegistryError::Serialization(format!("{url}: {e}")))?;
            Ok(body.synced)
        };
        with_timeout(send, self.timeout, format!("POST {url} timed out")).await
    }

    /// Push the local snapshot if the server answers its health check.
    /// `None` when the server was unavailable and nothing was sent.
    pub async fn auto_sync(&self, local: &LocalProvider) -> Option<SyncReport> {
        if !self.is_server_available().await {
            return None;
        }
        match local.run_blocking(|store| Ok(store.snapshot())).await {
            Ok(snapshot) => Some(self.sync_to_server(&snapshot).await),
            Err(e) => {
                tracing::warn!(base_url = %self.base_url, error = %e, "failed to read local schemas for sync");
                None
            }
        }
    }

    /// The remote's first listing page. Empty on any failure.
    pub async fn list_server_schemas(&self) -> Vec<SchemaData> {
        let listing = async {
            let response = self.get("/api/schemas").await?;
            if !response.status().is_success() {
                return Err(RegistryError::RemoteError {
                    status: response.status().as_u16(),
                    body: "failed to fetch server schemas".to_string(),
                });
            }
            response
                .json::<ServerListing>()
                .await
                .map_err(|e| RegistryError::Serialization(e.to_string()))
        };
        match listing.await {
            Ok(listing) => listing.schemas,
            Err(e) => {
                tracing::warn!(base_url = %self.base_url, error = %e, "failed to list server schemas");
                Vec::new()
            }
        }
    }

    pub async fn sync_status(&self, local: &LocalProvider) -> SyncStatus {
        let server_available = self.is_server_available().await;
        let server_schemas = if server_available {
            self.list_server_schemas().await.len()
        } else {
            0
        };
        SyncStatus {
            server_available,
            local_schemas: local
                .run_blocking(|store| Ok(store.snapshot().len()))
                .await
                .unwrap_or_default(),
            server_schemas,
            last_sync: self.last_sync(),
        }
    }

    /// Push after every mutation of `local`, debounced by [`DEBOUNCE`].
    ///
    /// Must be called from within a Tokio runtime; otherwise nothing is
    /// attached and a warning is logged.
    pub fn attach(&self, local: &LocalProvider) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "no async runtime, auto-sync not attached");
                return;
            }
        };
        let sync = self.clone();
        let weak = local.downgrade();
        local.subscribe(move || {
            let generation = sync.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let (sync, weak) = (sync.clone(), weak.clone());
            handle.spawn(async move {
                tokio::time::sleep(DEBOUNCE).await;
                if sync.state.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                if let Some(local) = weak.upgrade() {
                    sync.auto_sync(&local).await;
                }
            });
        });
        tracing::info!(base_url = %self.base_url, "auto-sync attached");
    }

    /// Push once after `delay`.
    pub fn schedule_initial(&self, local: &LocalProvider, delay: Duration) -> JoinHandle<Option<SyncReport>> {
        let sync = self.clone();
        let weak = local.downgrade();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let local = weak.upgrade()?;
            sync.auto_sync(&local).await
        })
    }
}
