//! Health, ping, and registry info endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use said_core::{SchemaQuery, Timestamp};
use serde_json::{json, Value};

use crate::state::AppState;

const ENDPOINTS: &[&str] = &[
    "GET /health - Provider availability",
    "GET /oobi/{said} - Resolve a schema body by SAID",
    "GET /api/schemas - List schemas",
    "POST /api/schemas - Create schema",
    "GET /api/schemas/{id} - Get schema by id",
    "PUT /api/schemas/{id} - Update schema",
    "DELETE /api/schemas/{id} - Delete schema",
    "GET /api/schemas/by-said/{said} - Get schema by SAID",
    "POST /api/schemas/bulk - Create several schemas",
    "DELETE /api/schemas/bulk - Delete several schemas",
    "POST /api/schemas/sync - Replace the local collection",
    "GET /api/schemas/export - Export every schema",
    "POST /api/schemas/import - Import an export document",
    "GET /api/schemas/info - API information",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/api/ping", get(ping))
        .route("/api/info", get(info))
        .route("/api/schemas/info", get(info))
}

/// 200 while the primary or the fallback can serve requests, 503 otherwise.
async fn health(State(state): State<AppState>) -> Response {
    let providers = state.service.get_health_status().await;
    let fallback_up = providers.fallback.as_ref().is_some_and(|f| f.available);
    let (code, status) = match (providers.primary.available, fallback_up) {
        (true, _) => (StatusCode::OK, "healthy"),
        (false, true) => (StatusCode::OK, "degraded"),
        (false, false) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };
    if code != StatusCode::OK {
        tracing::warn!("no storage provider is available");
    }
    let body = json!({
        "status": status,
        "timestamp": Timestamp::now(),
        "providers": providers,
    });
    (code, Json(body)).into_response()
}

async fn ping() -> Json<Value> {
    Json(json!({ "pong": true, "timestamp": Timestamp::now() }))
}

async fn info(State(state): State<AppState>) -> Json<Value> {
    let probe = SchemaQuery {
        limit: Some(1),
        ..Default::default()
    };
    let schema_count = match state.service.list_schemas(&probe).await {
        Ok(page) => Some(page.total),
        Err(e) => {
            tracing::warn!(error = %e, "schema count unavailable");
            None
        }
    };
    Json(json!({
        "name": "SAID Schema Registry",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Content-addressed JSON-Schema registry with OOBI resolution",
        "endpoints": ENDPOINTS,
        "status": "running",
        "provider": state.service.get_health_status().await,
        "schemaCount": schema_count,
    }))
}
