//! # Schema Collection Endpoints
//!
//! `/api/schemas` and its sub-resources. The same routes serve the
//! remote-provider protocol, so a `RemoteProvider` configured with
//! `base_url = http://host/api` can use another instance as its store.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use said_core::{
    CreateSchemaRequest, QueryDefaults, SchemaCollection, SchemaData, SchemaId, SchemaQuery,
    SortBy, SortOrder, UpdateSchemaRequest,
};
use said_store::{ImportReport, SchemaExport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{extract_json, ApiError};
use crate::routes::{host, parse_id, parse_said};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/schemas", get(list_schemas).post(create_schema))
        .route("/api/schemas/bulk", post(bulk_create).delete(bulk_delete))
        .route("/api/schemas/sync", post(sync_collection))
        .route("/api/schemas/export", get(export_schemas))
        .route("/api/schemas/import", post(import_schemas))
        .route("/api/schemas/by-said/{said}", get(get_schema_by_said))
        .route(
            "/api/schemas/{id}",
            get(get_schema).put(update_schema).delete(delete_schema),
        )
}

// -- Listing -------------------------------------------------------------------

/// Raw query string. Parsed leniently: unparsable paging or sorting values
/// fall back to the endpoint defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub created_by: Option<String>,
    pub is_public: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListParams {
    /// Resolve into a fully specified query using the HTTP defaults.
    pub fn into_query(self) -> SchemaQuery {
        let defaults = QueryDefaults::HTTP;
        let tags: Vec<String> = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        SchemaQuery {
            search: self.search.filter(|s| !s.is_empty()),
            tags: (!tags.is_empty()).then_some(tags),
            created_by: self.created_by.filter(|s| !s.is_empty()),
            is_public: self.is_public.and_then(|v| v.parse().ok()),
            limit: Some(
                self.limit
                    .and_then(|l| l.parse::<usize>().ok())
                    .filter(|l| *l > 0)
                    .unwrap_or(defaults.limit),
            ),
            offset: Some(self.offset.and_then(|o| o.parse().ok()).unwrap_or(0)),
            sort_by: Some(
                self.sort_by
                    .as_deref()
                    .and_then(SortBy::parse)
                    .unwrap_or(defaults.sort_by),
            ),
            sort_order: Some(
                self.sort_order
                    .as_deref()
                    .and_then(SortOrder::parse)
                    .unwrap_or(defaults.sort_order),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    schemas: Vec<SchemaData>,
    total: usize,
    has_more: bool,
    offset: usize,
    limit: usize,
}

async fn list_schemas(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = params.into_query();
    let page = state.service.list_schemas(&query).await?;
    Ok(Json(ListResponse {
        schemas: page.schemas,
        total: page.total,
        has_more: page.has_more,
        offset: query.offset.unwrap_or(0),
        limit: query.limit.unwrap_or(QueryDefaults::HTTP.limit),
    }))
}

// -- Single-record CRUD ---------------------------------------------------------

/// A created record plus the URL it resolves under.
#[derive(Debug, Serialize)]
struct CreatedSchema {
    #[serde(flatten)]
    record: SchemaData,
    oobi: String,
}

async fn create_schema(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateSchemaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedSchema>), ApiError> {
    let request = extract_json(body)?;
    request.validate()?;
    let record = state.service.create_schema(request).await?;
    let oobi = state.oobi_url(host(&headers), &record.metadata.said);
    tracing::info!(
        id = %record.metadata.id,
        said = %record.metadata.said,
        name = %record.metadata.name,
        "schema created"
    );
    Ok((StatusCode::CREATED, Json(CreatedSchema { record, oobi })))
}

async fn get_schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchemaData>, ApiError> {
    let id = parse_id(id)?;
    state
        .service
        .get_schema(&id)
        .await?
        .map(Json)
        .ok_or_else(ApiError::schema_not_found)
}

async fn get_schema_by_said(
    State(state): State<AppState>,
    Path(said): Path<String>,
) -> Result<Json<SchemaData>, ApiError> {
    let said = parse_said(said)?;
    state
        .service
        .get_schema_by_said(&said)
        .await?
        .map(Json)
        .ok_or_else(ApiError::schema_not_found)
}

async fn update_schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateSchemaRequest>, JsonRejection>,
) -> Result<Json<SchemaData>, ApiError> {
    let id = parse_id(id)?;
    let request = extract_json(body)?;
    request.validate()?;
    let record = state.service.update_schema(&id, request).await?;
    tracing::info!(%id, said = %record.metadata.said, "schema updated");
    Ok(Json(record))
}

async fn delete_schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(id)?;
    if !state.service.delete_schema(&id).await? {
        return Err(ApiError::schema_not_found());
    }
    tracing::info!(%id, "schema deleted");
    Ok(Json(json!({ "success": true, "deleted": id })))
}

// -- Bulk ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BulkCreateRequest {
    schemas: Vec<CreateSchemaRequest>,
}

#[derive(Debug, Deserialize)]
struct BulkDeleteRequest {
    ids: Vec<SchemaId>,
}

async fn bulk_create(
    State(state): State<AppState>,
    body: Result<Json<BulkCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<SchemaData>>), ApiError> {
    let BulkCreateRequest { schemas } = extract_json(body)?;
    for request in &schemas {
        request.validate()?;
    }
    let created = state.service.bulk_create_schemas(schemas).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn bulk_delete(
    State(state): State<AppState>,
    body: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let BulkDeleteRequest { ids } = extract_json(body)?;
    let results = state.service.bulk_delete_schemas(&ids).await?;
    Ok(Json(json!({ "results": results })))
}

// -- Sync, export, import -------------------------------------------------------

/// Replace the whole local collection with the pushed snapshot.
async fn sync_collection(
    State(state): State<AppState>,
    body: Result<Json<SchemaCollection>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Some(local) = state.service.local_primary() else {
        return Err(ApiError::ServiceUnavailable(
            "Sync only available in local mode".into(),
        ));
    };
    let collection = extract_json(body)?;
    let synced = local
        .run_blocking(move |store| store.replace_all(collection))
        .await?;
    tracing::info!(synced, "collection replaced by sync push");
    Ok(Json(json!({
        "success": true,
        "synced": synced,
        "message": format!("Synced {synced} schemas"),
    })))
}

async fn export_schemas(State(state): State<AppState>) -> Result<Json<SchemaExport>, ApiError> {
    Ok(Json(state.service.export_schemas().await?))
}

async fn import_schemas(
    State(state): State<AppState>,
    body: Result<Json<SchemaExport>, JsonRejection>,
) -> Result<Json<ImportReport>, ApiError> {
    let export = extract_json(body)?;
    let report = state.service.import_schemas(&export).await;
    tracing::info!(
        imported = report.imported,
        skipped = report.skipped,
        failed = report.errors.len(),
        "import finished"
    );
    Ok(Json(report))
}
