//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps [`RegistryError`] kinds to HTTP status codes and renders JSON
//! bodies of the form `{ "error": message, "code": CODE, ...details }`.
//! Server-side failures are logged and answered with a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use said_core::RegistryError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// One entry of the `available` list on an OOBI miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSchema {
    pub said: String,
    pub name: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unknown schema id (404).
    #[error("{0}")]
    NotFound(String),

    /// OOBI lookup miss (404). Lists what the registry can serve instead.
    #[error("Schema not found")]
    OobiNotFound {
        said: String,
        available: Vec<AvailableSchema>,
    },

    /// A different record already carries this SAID (409).
    #[error("Schema with this SAID already exists")]
    Conflict { said: String },

    /// Malformed, oversized, or invalid request body or parameter (400).
    #[error("{0}")]
    BadRequest(String),

    /// The operation is not offered by the current configuration (503).
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) | Self::OobiNotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Extra top-level fields merged into the body.
    fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            Self::OobiNotFound { said, available } => {
                details.insert("said".into(), json!(said));
                details.insert("available".into(), json!(available));
            }
            Self::Conflict { said } => {
                details.insert("said".into(), json!(said));
            }
            _ => {}
        }
        details
    }

    pub fn schema_not_found() -> Self {
        Self::NotFound("Schema not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let mut body = Map::new();
        body.insert("error".into(), Value::String(message));
        body.insert("code".into(), Value::String(code.to_string()));
        body.extend(self.details());

        (status, Json(Value::Object(body))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::schema_not_found(),
            RegistryError::Conflict { said } => Self::Conflict { said },
            RegistryError::InvalidInput(msg) => Self::BadRequest(msg),
            // A remote primary's client errors keep their meaning at this boundary.
            RegistryError::RemoteError { status: 409, body } => Self::Conflict {
                said: said_from_body(&body),
            },
            RegistryError::RemoteError { status: 400, body } => Self::BadRequest(body),
            other => Self::Internal(other.to_string()),
        }
    }
}

fn said_from_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("said").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}

/// Unwrap a JSON body, mapping deserialization and size-limit failures to
/// [`ApiError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| ApiError::BadRequest(err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn not_found_status_code() {
        let (status, code) = ApiError::schema_not_found().status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn conflict_status_code() {
        let err = ApiError::Conflict { said: "Iabc".into() };
        assert_eq!(err.status_and_code(), (StatusCode::CONFLICT, "CONFLICT"));
    }

    #[test]
    fn bad_request_is_400() {
        let (status, code) = ApiError::BadRequest("nope".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn registry_errors_map_to_api_errors() {
        assert!(matches!(
            ApiError::from(RegistryError::NotFound("schema_1".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(RegistryError::InvalidInput("x".into())),
            ApiError::BadRequest(_)
        ));
        for err in [
            RegistryError::StorageUnavailable("disk".into()),
            RegistryError::Timeout("slow".into()),
            RegistryError::Transport("refused".into()),
            RegistryError::RemoteError {
                status: 502,
                body: "bad gateway".into(),
            },
        ] {
            assert!(matches!(ApiError::from(err), ApiError::Internal(_)));
        }
    }

    #[test]
    fn remote_conflict_recovers_said() {
        let err = ApiError::from(RegistryError::RemoteError {
            status: 409,
            body: r#"{"error":"dup","said":"Ixyz"}"#.into(),
        });
        match err {
            ApiError::Conflict { said } => assert_eq!(said, "Ixyz"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn conflict_body_echoes_said() {
        let (status, body) = body_json(ApiError::Conflict { said: "Iabc".into() }).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["said"], "Iabc");
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(body["error"], "Schema with this SAID already exists");
    }

    #[tokio::test]
    async fn internal_message_is_not_leaked() {
        let (status, body) = body_json(ApiError::Internal("secret path /var/db".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
        assert!(!body.to_string().contains("/var/db"));
    }

    #[tokio::test]
    async fn oobi_miss_lists_available() {
        let (status, body) = body_json(ApiError::OobiNotFound {
            said: "Imissing".into(),
            available: vec![AvailableSchema {
                said: "Ione".into(),
                name: "One".into(),
            }],
        })
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Schema not found");
        assert_eq!(body["said"], "Imissing");
        assert_eq!(body["available"], json!([{"said": "Ione", "name": "One"}]));
    }
}
