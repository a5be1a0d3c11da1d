//! # API Route Modules
//!
//! - `health`: liveness, ping, and registry info, each also mounted under
//!   `/api` so a remote provider rooted at `http://host/api` can probe it.
//! - `oobi`: raw JSON-Schema resolution by SAID.
//! - `schemas`: the schema collection, bulk, sync, and export/import
//!   endpoints. Also the remote-provider protocol.

pub mod health;
pub mod oobi;
pub mod schemas;

use axum::http::HeaderMap;
use said_core::{Said, SchemaId};

use crate::error::ApiError;

/// Validate an id path segment.
pub(crate) fn parse_id(raw: String) -> Result<SchemaId, ApiError> {
    SchemaId::new(raw).map_err(ApiError::from)
}

/// Validate a SAID path segment.
pub(crate) fn parse_said(raw: String) -> Result<Said, ApiError> {
    if raw.is_empty() {
        return Err(ApiError::BadRequest("Schema SAID required".into()));
    }
    Said::new(raw).map_err(ApiError::from)
}

pub(crate) fn host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
}
