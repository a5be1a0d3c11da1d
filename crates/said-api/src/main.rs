//! # said-registry: Binary Entry Point
//!
//! Starts the registry HTTP server. Settings come from `SAID_*`
//! environment variables; command-line flags take precedence.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use said_api::state::{AppState, ServerConfig};
use said_store::{SchemaService, SchemaSync, INITIAL_SYNC_DELAY};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "said-registry", version, about = "SAID-addressed JSON-Schema registry with OOBI resolution")]
struct Cli {
    /// Port to listen on [env: SAID_PORT]
    #[arg(long)]
    port: Option<u16>,

    /// JSON file backing the local store [env: SAID_STORAGE_FILE]
    #[arg(long)]
    storage_file: Option<PathBuf>,

    /// Use a remote registry as primary store [env: SAID_REMOTE_URL]
    #[arg(long)]
    remote_url: Option<String>,

    /// Bearer token for the remote registry [env: SAID_REMOTE_API_KEY]
    #[arg(long)]
    remote_api_key: Option<String>,

    /// Disable the in-memory fallback for a remote primary [env: SAID_FALLBACK_LOCAL=false]
    #[arg(long)]
    no_fallback: bool,

    /// Push local changes to this registry instance [env: SAID_SYNC_URL]
    #[arg(long)]
    sync_url: Option<String>,

    /// Public origin used in OOBI URLs [env: SAID_PUBLIC_URL]
    #[arg(long)]
    public_url: Option<String>,

    /// Log as JSON lines [env: SAID_LOG_JSON]
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.storage_file.is_some() {
            config.storage_file = self.storage_file;
        }
        if self.remote_url.is_some() {
            config.remote_url = self.remote_url;
        }
        if self.remote_api_key.is_some() {
            config.remote_api_key = self.remote_api_key;
        }
        if self.no_fallback {
            config.fallback_local = false;
        }
        if self.sync_url.is_some() {
            config.sync_url = self.sync_url;
        }
        if self.public_url.is_some() {
            config.public_url = self.public_url;
        }
        config.log_json |= self.log_json;
        config
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().apply(ServerConfig::from_env());
    init_tracing(config.log_json);
    tracing::info!(?config, "starting said-registry");

    let service = SchemaService::new(&config.service_config())
        .context("failed to configure storage provider")?;

    if let Some(sync_url) = &config.sync_url {
        match service.local_primary() {
            Some(local) => {
                let sync = SchemaSync::new(sync_url.clone()).context("invalid sync URL")?;
                sync.attach(&local);
                // Detached; the report is logged by the sync utility.
                drop(sync.schedule_initial(&local, INITIAL_SYNC_DELAY));
                tracing::info!(%sync_url, "pushing local changes to peer registry");
            }
            None => tracing::warn!(%sync_url, "sync requires a local primary store; ignoring"),
        }
    }

    let mut state = AppState::new(service);
    if let Some(public_url) = &config.public_url {
        state = state.with_public_url(public_url.clone());
    }
    let app = said_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("said-registry listening on {addr}");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
