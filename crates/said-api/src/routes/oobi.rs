//! OOBI resolution: `GET /oobi/{said}` answers with the raw JSON-Schema
//! body, never the metadata envelope.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use said_core::Said;
use serde_json::Value;

use crate::error::{ApiError, AvailableSchema};
use crate::routes::parse_said;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oobi/{said}", get(resolve))
        .route("/api/oobi/{said}", get(resolve))
        .route("/oobi", get(missing_said))
        .route("/oobi/", get(missing_said))
}

async fn resolve(
    State(state): State<AppState>,
    Path(said): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let said = parse_said(said)?;
    match state.service.get_schema_for_oobi(&said).await? {
        Some(body) => {
            tracing::info!(%said, "serving schema via OOBI");
            Ok(Json(body))
        }
        None => {
            tracing::warn!(%said, "OOBI lookup miss");
            let available = available(&state, &said).await;
            Err(ApiError::OobiNotFound {
                said: said.into_inner(),
                available,
            })
        }
    }
}

async fn missing_said() -> ApiError {
    ApiError::BadRequest("Schema SAID required".into())
}

/// Everything the registry could have served. Best effort.
async fn available(state: &AppState, requested: &Said) -> Vec<AvailableSchema> {
    match state.service.export_schemas().await {
        Ok(export) => export
            .schemas
            .into_iter()
            .map(|s| AvailableSchema {
                said: s.metadata.said.into_inner(),
                name: s.metadata.name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(said = %requested, error = %e, "could not enumerate schemas for OOBI miss");
            Vec::new()
        }
    }
}
