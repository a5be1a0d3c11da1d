//! # Application State & Server Configuration
//!
//! [`AppState`] is shared across handlers via Axum's `State` extractor.
//! [`ServerConfig`] collects the deployment settings of the
//! `said-registry` binary from `SAID_*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;

use said_core::{RegistryError, Said};
use said_store::{ProviderConfig, RemoteConfig, SchemaService, ServiceConfig};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3001;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SchemaService>,
    /// Externally reachable origin used to build OOBI URLs. When unset the
    /// request's `Host` header is used.
    pub public_url: Option<String>,
}

impl AppState {
    pub fn new(service: SchemaService) -> Self {
        Self {
            service: Arc::new(service),
            public_url: None,
        }
    }

    /// State over an in-memory Local Provider with no fallback.
    pub fn in_memory() -> Result<Self, RegistryError> {
        Ok(Self::new(SchemaService::new(&ServiceConfig::local())?))
    }

    pub fn with_public_url(mut self, public_url: impl Into<String>) -> Self {
        self.public_url = Some(public_url.into());
        self
    }

    /// OOBI URL under which `said` is resolvable.
    pub fn oobi_url(&self, host: Option<&str>, said: &Said) -> String {
        let origin = match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", host.unwrap_or("localhost")),
        };
        format!("{origin}/oobi/{said}")
    }
}

/// Deployment settings for the `said-registry` server.
///
/// Custom `Debug` redacts the remote API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Backing file of the Local Provider. In-memory when unset.
    pub storage_file: Option<PathBuf>,
    /// Base URL of a remote registry to use as primary provider.
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
    /// Fall back to an in-memory Local Provider when the remote fails.
    pub fallback_local: bool,
    /// Root URL of another registry instance to push local changes to.
    pub sync_url: Option<String>,
    pub public_url: Option<String>,
    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("storage_file", &self.storage_file)
            .field("remote_url", &self.remote_url)
            .field(
                "remote_api_key",
                &self.remote_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("fallback_local", &self.fallback_local)
            .field("sync_url", &self.sync_url)
            .field("public_url", &self.public_url)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            storage_file: None,
            remote_url: None,
            remote_api_key: None,
            fallback_local: true,
            sync_url: None,
            public_url: None,
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// Read `SAID_PORT`, `SAID_STORAGE_FILE`, `SAID_REMOTE_URL`,
    /// `SAID_REMOTE_API_KEY`, `SAID_FALLBACK_LOCAL`, `SAID_SYNC_URL`,
    /// `SAID_PUBLIC_URL`, and `SAID_LOG_JSON`. Unset or unparsable values
    /// keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            port: var("SAID_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            storage_file: var("SAID_STORAGE_FILE").map(PathBuf::from),
            remote_url: var("SAID_REMOTE_URL"),
            remote_api_key: var("SAID_REMOTE_API_KEY"),
            fallback_local: var("SAID_FALLBACK_LOCAL")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.fallback_local),
            sync_url: var("SAID_SYNC_URL"),
            public_url: var("SAID_PUBLIC_URL"),
            log_json: var("SAID_LOG_JSON")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.log_json),
        }
    }

    /// Provider selection: remote when a remote URL is configured, local otherwise.
    pub fn service_config(&self) -> ServiceConfig {
        let provider = match &self.remote_url {
            Some(url) => {
                let mut remote = RemoteConfig::new(url.clone());
                if let Some(key) = &self.remote_api_key {
                    remote = remote.with_api_key(key.clone());
                }
                ProviderConfig::Remote(remote)
            }
            None => ProviderConfig::Local {
                path: self.storage_file.clone(),
            },
        };
        ServiceConfig {
            provider,
            fallback_to_local: self.fallback_local,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
