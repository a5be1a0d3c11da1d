//! # Remote Provider
//!
//! Maps the provider contract onto the registry's HTTP/JSON protocol,
//! rooted at a configured base URL:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create | `POST /schemas` |
//! | read / update / delete | `GET` / `PUT` / `DELETE /schemas/{id}` |
//! | read_by_said / exists | `GET` / `HEAD /schemas/by-said/{said}` |
//! | list | `GET /schemas?search=&tags=a,b&...` |
//! | bulk_create | `POST /schemas/bulk {schemas}` |
//! | bulk_delete | `DELETE /schemas/bulk {ids}` → `{results}` |
//! | get_schema_for_oobi | `GET /oobi/{said}` |
//! | is_available | `GET /health` |
//!
//! ## Timeout & Retry
//!
//! Each attempt is bounded by `timeout`; on expiry the in-flight request
//! is dropped and the call fails with [`RegistryError::Timeout`] without
//! further attempts. Up to `retries` attempts are made. Client errors
//! (4xx) propagate immediately; other failures wait `backoff_base * 2^n`
//! before attempt `n + 1`. The backoff is uncapped.
//!
//! A 404 becomes an absent result where the contract allows one. A
//! success response without a JSON content type decodes as `{}`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use said_core::{
    with_timeout, CreateSchemaRequest, RegistryError, Said, SchemaData, SchemaId, SchemaQuery,
    SchemaSearchResult, UpdateSchemaRequest,
};

use crate::provider::{ProviderInfo, ProviderKind, StorageProvider};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default attempt budget.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default backoff base (1s, 2s, 4s, ...).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Connection settings for a remote registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Protocol root, e.g. `https://registry.example.com/api`.
    pub base_url: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff_base: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Result of [`RemoteProvider::ping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResult {
    /// Round-trip time in milliseconds.
    pub latency: u64,
    pub status: String,
}

#[derive(Deserialize)]
struct BulkDeleteResponse {
    results: Vec<bool>,
}

/// HTTP-backed schema provider.
#[derive(Debug, Clone)]
pub struct RemoteProvider {
    client: reqwest::Client,
    config: Arc<RwLock<RemoteConfig>>,
}

impl RemoteProvider {
    pub fn new(config: RemoteConfig) -> Result<Self, RegistryError> {
        validate_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RegistryError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Current configuration.
    pub fn config(&self) -> RemoteConfig {
        self.config.read().clone()
    }

    /// Modify the configuration in place. Calls already in flight keep the
    /// settings they started with.
    pub fn update_config(&self, update: impl FnOnce(&mut RemoteConfig)) {
        let mut config = self.config.write();
        update(&mut config);
        tracing::info!(base_url = %config.base_url, "remote provider reconfigured");
    }

    /// Round-trip latency to `GET /ping`.
    pub async fn ping(&self) -> Result<PingResult, RegistryError> {
        let start = Instant::now();
        self.request(Method::GET, "/ping", None, &[]).await?;
        Ok(PingResult {
            latency: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            status: "ok".to_string(),
        })
    }

    /// Server metadata from `GET /info`.
    pub async fn server_info(&self) -> Result<Value, RegistryError> {
        self.request(Method::GET, "/info", None, &[]).await
    }

    /// Issue one call with the timeout and retry policy applied.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value, RegistryError> {
        let config = self.config();
        let url = config.url(path);
        let attempts = config.retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.attempt(&config, method.clone(), &url, body, query).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt + 1 < attempts {
                        let delay = config.backoff_base * 2u32.saturating_pow(attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_attempts = attempts,
                            %method,
                            url = %url,
                            "remote registry request failed, retrying in {delay:?}: {e}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RegistryError::Transport(format!("{method} {url}: no attempt made"))))
    }

    /// One deadline-bounded attempt.
    async fn attempt(
        &self,
        config: &RemoteConfig,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value, RegistryError> {
        with_timeout(
            self.send(config, method, url, body, query),
            config.timeout,
            format!("request timeout after {}ms", config.timeout.as_millis()),
        )
        .await
    }

    async fn send(
        &self,
        config: &RemoteConfig,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value, RegistryError> {
        let is_head = method == Method::HEAD;
        let mut request = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(key) = &config.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout(format!("{url}: {e}"))
            } else {
                RegistryError::Transport(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::RemoteError {
                status: status.as_u16(),
                body,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        if is_head || !is_json {
            return Ok(json!({}));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RegistryError::Serialization(format!("{url}: {e}")))
    }
}

pub(crate) fn validate_base_url(base_url: &str) -> Result<(), RegistryError> {
    url::Url::parse(base_url)
        .map(|_| ())
        .map_err(|e| RegistryError::InvalidInput(format!("invalid base URL {base_url:?}: {e}")))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RegistryError> {
    Ok(serde_json::from_value(value)?)
}

/// Translate a remote 404 into an absent result.
fn absent_on_404<T>(result: Result<T, RegistryError>) -> Result<Option<T>, RegistryError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_remote_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn list_params(query: &SchemaQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        params.push(("search", search.clone()));
    }
    if let Some(tags) = query.tags.as_ref().filter(|t| !t.is_empty()) {
        params.push(("tags", tags.join(",")));
    }
    if let Some(created_by) = &query.created_by {
        params.push(("createdBy", created_by.clone()));
    }
    if let Some(is_public) = query.is_public {
        params.push(("isPublic", is_public.to_string()));
    }
    if let Some(limit) = query.limit.filter(|l| *l > 0) {
        params.push(("limit", limit.to_string()));
    }
    if let Some(offset) = query.offset.filter(|o| *o > 0) {
        params.push(("offset", offset.to_string()));
    }
    if let Some(sort_by) = query.sort_by {
        params.push(("sortBy", sort_by.as_str().to_string()));
    }
    if let Some(sort_order) = query.sort_order {
        params.push(("sortOrder", sort_order.as_str().to_string()));
    }
    params
}

#[async_trait]
impl StorageProvider for RemoteProvider {
    async fn create(&self, request: CreateSchemaRequest) -> Result<SchemaData, RegistryError> {
        let body = serde_json::to_value(&request)?;
        decode(self.request(Method::POST, "/schemas", Some(&body), &[]).await?)
    }

    async fn read(&self, id: &SchemaId) -> Result<Option<SchemaData>, RegistryError> {
        let path = format!("/schemas/{id}");
        absent_on_404(self.request(Method::GET, &path, None, &[]).await)?
            .map(decode)
            .transpose()
    }

    async fn read_by_said(&self, said: &Said) -> Result<Option<SchemaData>, RegistryError> {
        let path = format!("/schemas/by-said/{said}");
        absent_on_404(self.request(Method::GET, &path, None, &[]).await)?
            .map(decode)
            .transpose()
    }

    async fn update(
        &self,
        id: &SchemaId,
        request: UpdateSchemaRequest,
    ) -> Result<SchemaData, RegistryError> {
        let path = format!("/schemas/{id}");
        let body = serde_json::to_value(&request)?;
        match self.request(Method::PUT, &path, Some(&body), &[]).await {
            Ok(value) => decode(value),
            Err(e) if e.is_remote_not_found() => Err(RegistryError::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, id: &SchemaId) -> Result<bool, RegistryError> {
        let path = format!("/schemas/{id}");
        Ok(absent_on_404(self.request(Method::DELETE, &path, None, &[]).await)?.is_some())
    }

    async fn list(&self, query: &SchemaQuery) -> Result<SchemaSearchResult, RegistryError> {
        let params = list_params(query);
        decode(self.request(Method::GET, "/schemas", None, &params).await?)
    }

    async fn exists(&self, said: &Said) -> Result<bool, RegistryError> {
        let path = format!("/schemas/by-said/{said}");
        Ok(absent_on_404(self.request(Method::HEAD, &path, None, &[]).await)?.is_some())
    }

    async fn bulk_create(
        &self,
        requests: Vec<CreateSchemaRequest>,
    ) -> Result<Vec<SchemaData>, RegistryError> {
        let body = json!({ "schemas": requests });
        decode(self.request(Method::POST, "/schemas/bulk", Some(&body), &[]).await?)
    }

    async fn bulk_delete(&self, ids: &[SchemaId]) -> Result<Vec<bool>, RegistryError> {
        let body = json!({ "ids": ids });
        let response: BulkDeleteResponse =
            decode(self.request(Method::DELETE, "/schemas/bulk", Some(&body), &[]).await?)?;
        Ok(response.results)
    }

    async fn get_schema_for_oobi(&self, said: &Said) -> Result<Option<Value>, RegistryError> {
        let path = format!("/oobi/{said}");
        absent_on_404(self.request(Method::GET, &path, None, &[]).await)
    }

    /// Single attempt against `/health`; the retry budget is not spent on
    /// a liveness probe.
    async fn is_available(&self) -> bool {
        let config = self.config();
        let url = config.url("/health");
        match self.attempt(&config, Method::GET, &url, None, &[]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "remote registry unavailable");
                false
            }
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "Remote API Schema Provider".to_string(),
            kind: ProviderKind::Remote,
            version: "1.0.0".to_string(),
            capabilities: [
                "create",
                "read",
                "update",
                "delete",
                "list",
                "search",
                "bulk_operations",
                "oobi",
                "remote_sync",
                "multi_user",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}
