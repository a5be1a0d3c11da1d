//! # said-api: HTTP Surface of the SAID Schema Registry
//!
//! Axum router over a [`said_store::SchemaService`]:
//!
//! - `GET /oobi/{said}`: the raw JSON-Schema body for a SAID.
//! - `/api/schemas`: list, create, read, update, delete, bulk, sync,
//!   export and import.
//! - `/health`, `/api/ping`, `/api/info`: probes and registry metadata.
//!
//! The `/api` tree doubles as the remote-provider protocol, so one
//! instance can act as the remote store of another.

pub mod error;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, Uri};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body limit: 1 MiB.
pub const BODY_LIMIT: usize = 1024 * 1024;

/// Build the complete application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::oobi::router())
        .merge(routes::schemas::router())
        .fallback(unknown_endpoint)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn unknown_endpoint(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound(format!("API endpoint not found: {method} {}", uri.path()))
}
