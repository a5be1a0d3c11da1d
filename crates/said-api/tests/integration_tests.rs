//! # Integration Tests for said-api
//!
//! Drives the router with `tower::ServiceExt::oneshot`: OOBI resolution,
//! duplicate detection, the collection endpoints, sync replacement, and
//! error bodies. The last tests bind a real listener and point a
//! `RemoteProvider` and a `SchemaSync` at it.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use said_api::state::AppState;
use said_core::{CreateSchemaRequest, Said, SchemaCollection, SchemaQuery};
use said_store::{
    LocalProvider, ProviderConfig, RemoteConfig, RemoteProvider, SchemaService, SchemaSync,
    ServiceConfig, StorageProvider,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> axum::Router {
    said_api::app(AppState::in_memory().unwrap())
}

fn app_over(local: &LocalProvider) -> axum::Router {
    said_api::app(AppState::new(SchemaService::from_local(local.clone())))
}

async fn send(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let bytes = body.map(|value| serde_json::to_vec(&value).unwrap());
    send_bytes(app, method, uri, bytes).await
}

/// Like [`send`] with a pre-encoded body. Serializing a collection straight
/// to bytes keeps its entry order, which a round trip through `Value` does not.
async fn send_bytes(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Vec<u8>>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "registry.test:3001");
    let body = match body {
        Some(bytes) => {
            builder = builder.header("content-type", "application/json");
            Body::from(bytes)
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn passport_body() -> Value {
    json!({"type": "object", "properties": {"num": {"type": "string"}}})
}

async fn create(app: &axum::Router, name: &str, schema: Value) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/schemas",
        Some(json!({"name": name, "jsonSchema": schema})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

// -- OOBI ---------------------------------------------------------------------

#[tokio::test]
async fn created_schema_resolves_via_oobi_without_envelope() {
    let app = test_app();
    let created = create(&app, "Passport", passport_body()).await;

    let said = created["metadata"]["said"].as_str().unwrap().to_string();
    assert_eq!(said.len(), 44);
    assert!(said.starts_with('I'));
    assert_eq!(created["oobi"], format!("http://registry.test:3001/oobi/{said}"));

    let (status, body) = send(&app, Method::GET, &format!("/oobi/{said}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, passport_body());

    let (status, body) = send(&app, Method::GET, &format!("/api/oobi/{said}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, passport_body());
}

#[tokio::test]
async fn oobi_miss_lists_available_schemas() {
    let app = test_app();
    let created = create(&app, "Passport", passport_body()).await;

    let (status, body) = send(&app, Method::GET, "/oobi/Inope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Schema not found");
    assert_eq!(body["said"], "Inope");
    assert_eq!(
        body["available"],
        json!([{"said": created["metadata"]["said"], "name": "Passport"}])
    );
}

#[tokio::test]
async fn oobi_without_said_is_bad_request() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/oobi/", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Schema SAID required");
}

#[tokio::test]
async fn public_url_overrides_host_in_oobi_link() {
    let state = AppState::in_memory()
        .unwrap()
        .with_public_url("https://schemas.example.com");
    let app = said_api::app(state);
    let created = create(&app, "Passport", passport_body()).await;
    let said = created["metadata"]["said"].as_str().unwrap();
    assert_eq!(created["oobi"], format!("https://schemas.example.com/oobi/{said}"));
}

// -- Create / duplicate detection ----------------------------------------------

#[tokio::test]
async fn duplicate_content_is_conflict_echoing_said() {
    let app = test_app();
    let first = create(&app, "Passport", passport_body()).await;

    // Different name, same body: same SAID.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/schemas",
        Some(json!({"name": "Passport copy", "jsonSchema": passport_body()})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["said"], first["metadata"]["said"]);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn self_reference_field_does_not_change_said() {
    let app = test_app();
    let first = create(&app, "Passport", passport_body()).await;

    let mut with_id = passport_body();
    with_id["$id"] = json!("anything");
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/schemas",
        Some(json!({"name": "Passport", "jsonSchema": with_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["said"], first["metadata"]["said"]);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/schemas")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/api/schemas", Some(json!({"name": "No body"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/schemas",
        Some(json!({"name": "  ", "jsonSchema": {"type": "object"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/schemas",
        Some(json!({"name": "Array", "jsonSchema": [1, 2, 3]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_bad_request() {
    let app = test_app();
    let filler = "x".repeat(said_api::BODY_LIMIT + 1);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/schemas",
        Some(json!({"name": "Huge", "jsonSchema": {"description": filler}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -- Read / update / delete --------------------------------------------------------

#[tokio::test]
async fn unknown_id_is_404() {
    let app = test_app();
    for method in [Method::GET, Method::DELETE] {
        let (status, body) = send(&app, method, "/api/schemas/schema_missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Schema not found");
    }
    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/schemas/schema_missing",
        Some(json!({"name": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn read_update_delete_round() {
    let app = test_app();
    let created = create(&app, "Passport", passport_body()).await;
    let id = created["metadata"]["id"].as_str().unwrap();
    let uri = format!("/api/schemas/{id}");

    let (status, fetched) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["metadata"], created["metadata"]);
    assert!(fetched.get("oobi").is_none());

    let new_body = json!({"type": "object", "properties": {"num": {"type": "integer"}}});
    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        Some(json!({"name": "Passport v2", "jsonSchema": new_body, "tags": ["kyc", "kyc"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["metadata"]["name"], "Passport v2");
    assert_eq!(updated["metadata"]["tags"], json!(["kyc"]));
    assert_ne!(updated["metadata"]["said"], created["metadata"]["said"]);
    assert_eq!(updated["metadata"]["createdAt"], created["metadata"]["createdAt"]);

    let new_said = updated["metadata"]["said"].as_str().unwrap();
    let (status, body) = send(&app, Method::GET, &format!("/oobi/{new_said}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, new_body);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "deleted": id}));

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_onto_existing_said_is_conflict() {
    let app = test_app();
    let a = create(&app, "A", json!({"title": "a"})).await;
    let b = create(&app, "B", json!({"title": "b"})).await;
    let uri = format!("/api/schemas/{}", b["metadata"]["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"jsonSchema": {"title": "a"}}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["said"], a["metadata"]["said"]);
}

#[tokio::test]
async fn by_said_lookup_supports_head() {
    let app = test_app();
    let created = create(&app, "Passport", passport_body()).await;
    let said = created["metadata"]["said"].as_str().unwrap();
    let uri = format!("/api/schemas/by-said/{said}");

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["id"], created["metadata"]["id"]);

    let (status, _) = send(&app, Method::HEAD, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::HEAD, "/api/schemas/by-said/Inope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Listing ------------------------------------------------------------------

#[tokio::test]
async fn listing_filters_sorts_and_paginates() {
    let app = test_app();
    for (name, tag) in [("Passport", "kyc"), ("Ticket", "travel"), ("Visa", "travel")] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/schemas",
            Some(json!({"name": name, "jsonSchema": {"title": name}, "tags": [tag]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let (status, body) = send(&app, Method::GET, "/api/schemas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 100);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["hasMore"], false);
    // Default order: updatedAt desc.
    assert_eq!(body["schemas"][0]["metadata"]["name"], "Visa");

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/schemas?sortBy=name&sortOrder=asc&limit=2&offset=1",
        None,
    )
    .await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["hasMore"], false);
    let names: Vec<_> = body["schemas"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["metadata"]["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Ticket", "Visa"]);

    let (_, body) = send(&app, Method::GET, "/api/schemas?tags=kyc,unknown", None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, Method::GET, "/api/schemas?search=TICK&limit=1", None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["schemas"][0]["metadata"]["name"], "Ticket");

    let (_, body) = send(&app, Method::GET, "/api/schemas?limit=1", None).await;
    assert_eq!(body["hasMore"], true);
}

// -- Bulk ------------------------------------------------------------------

#[tokio::test]
async fn bulk_create_and_delete() {
    let app = test_app();
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/schemas/bulk",
        Some(json!({"schemas": [
            {"name": "A", "jsonSchema": {"title": "a"}},
            {"name": "B", "jsonSchema": {"title": "b"}}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let ids: Vec<Value> = created
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["metadata"]["id"].clone())
        .collect();
    assert_eq!(ids.len(), 2);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/schemas/bulk",
        Some(json!({"ids": [ids[0], "schema_missing", ids[1]]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"results": [true, false, true]}));
}

// -- Sync ---------------------------------------------------------------------

#[tokio::test]
async fn sync_replaces_local_collection() {
    let local = LocalProvider::in_memory();
    let app = app_over(&local);
    create(&app, "Old", json!({"title": "old"})).await;

    let source = LocalProvider::in_memory();
    for name in ["New 1", "New 2"] {
        source
            .create(CreateSchemaRequest::new(name, json!({"title": name})))
            .await
            .unwrap();
    }
    let snapshot = serde_json::to_vec(&source.snapshot()).unwrap();

    let (status, body) = send_bytes(&app, Method::POST, "/api/schemas/sync", Some(snapshot)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["synced"], 2);
    assert_eq!(body["message"], "Synced 2 schemas");

    assert_eq!(local.snapshot(), source.snapshot());
    let (_, listing) = send(&app, Method::GET, "/api/schemas", None).await;
    assert_eq!(listing["total"], 2);
}

#[tokio::test]
async fn sync_rejects_forged_saids_and_keeps_store() {
    let local = LocalProvider::in_memory();
    let app = app_over(&local);
    let kept = create(&app, "Kept", json!({"title": "kept"})).await;

    let source = LocalProvider::in_memory();
    for name in ["a", "b"] {
        source
            .create(CreateSchemaRequest::new(name, json!({"title": name})))
            .await
            .unwrap();
    }
    let mut records = source.snapshot().into_vec();
    for record in &mut records {
        record.metadata.said = Said::new("IForged").unwrap();
    }
    let forged: SchemaCollection = records.into_iter().collect();
    let payload = serde_json::to_vec(&forged).unwrap();

    let (status, body) = send_bytes(&app, Method::POST, "/api/schemas/sync", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = send(&app, Method::GET, "/oobi/IForged", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let stored: Vec<_> = local.snapshot().iter().map(|r| r.metadata.name.clone()).collect();
    assert_eq!(stored, vec!["Kept"]);
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/oobi/{}", kept["metadata"]["said"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sync_rejects_ids_shadowed_by_routes() {
    let local = LocalProvider::in_memory();
    let app = app_over(&local);
    let source = LocalProvider::in_memory();
    let record = source
        .create(CreateSchemaRequest::new("Bulk", json!({"title": "bulk"})))
        .await
        .unwrap();
    let mut entry = serde_json::to_value(&record).unwrap();
    entry["metadata"]["id"] = json!("bulk");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/schemas/sync",
        Some(json!({ "bulk": entry })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["error"].as_str().unwrap().contains("reserved"), "{body}");
    assert!(local.snapshot().is_empty());
}

#[tokio::test]
async fn sync_is_unavailable_for_remote_primary() {
    let service = SchemaService::new(&ServiceConfig {
        provider: ProviderConfig::Remote(RemoteConfig::new("http://127.0.0.1:1")),
        fallback_to_local: true,
    })
    .unwrap();
    let app = said_api::app(AppState::new(service));

    let (status, body) = send(&app, Method::POST, "/api/schemas/sync", Some(json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Sync only available in local mode");
}

// -- Export / import ----------------------------------------------------------

#[tokio::test]
async fn export_then_import_into_another_instance() {
    let source = test_app();
    create(&source, "A", json!({"title": "a"})).await;
    create(&source, "B", json!({"title": "b"})).await;
    let (status, export) = send(&source, Method::GET, "/api/schemas/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["version"], "1.0.0");
    assert_eq!(export["schemas"].as_array().unwrap().len(), 2);

    let target = test_app();
    create(&target, "A again", json!({"title": "a"})).await;
    let (status, report) = send(&target, Method::POST, "/api/schemas/import", Some(export)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, json!({"imported": 1, "skipped": 1, "errors": []}));
}

// -- Probes & fallback ------------------------------------------------------

#[tokio::test]
async fn health_info_and_ping() {
    let app = test_app();
    create(&app, "Passport", passport_body()).await;

    for uri in ["/health", "/api/health"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["providers"]["primary"]["info"]["type"], "local");
    }

    let (status, body) = send(&app, Method::GET, "/api/schemas/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schemaCount"], 1);
    assert_eq!(body["status"], "running");

    let (status, body) = send(&app, Method::GET, "/api/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pong"], true);
}

#[tokio::test]
async fn unknown_endpoint_is_json_404() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unreachable_remote_primary_is_served_by_fallback() {
    let remote = RemoteConfig::new("http://127.0.0.1:1")
        .with_retries(1)
        .with_timeout(Duration::from_millis(200));
    let service = SchemaService::new(&ServiceConfig {
        provider: ProviderConfig::Remote(remote),
        fallback_to_local: true,
    })
    .unwrap();
    let app = said_api::app(AppState::new(service));

    let created = create(&app, "Passport", passport_body()).await;
    let said = created["metadata"]["said"].as_str().unwrap();
    let (status, body) = send(&app, Method::GET, &format!("/oobi/{said}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, passport_body());

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
}

// -- Over a real socket --------------------------------------------------------

async fn spawn_server(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn remote_provider_speaks_to_a_live_instance() {
    let origin = spawn_server(test_app()).await;
    let remote = RemoteProvider::new(
        RemoteConfig::new(format!("{origin}/api")).with_backoff_base(Duration::from_millis(10)),
    )
    .unwrap();

    assert!(remote.is_available().await);

    let created = remote
        .create(CreateSchemaRequest::new("Passport", passport_body()))
        .await
        .unwrap();
    let id = created.metadata.id.clone();
    let said = created.metadata.said.clone();

    assert_eq!(remote.read(&id).await.unwrap(), Some(created.clone()));
    assert!(remote.exists(&said).await.unwrap());
    assert_eq!(remote.read_by_said(&said).await.unwrap(), Some(created.clone()));
    assert_eq!(remote.get_schema_for_oobi(&said).await.unwrap(), Some(passport_body()));
    assert_eq!(remote.list(&SchemaQuery::default()).await.unwrap().total, 1);

    let missing = Said::new("Inope").unwrap();
    assert!(!remote.exists(&missing).await.unwrap());
    assert_eq!(remote.get_schema_for_oobi(&missing).await.unwrap(), None);

    let err = remote
        .create(CreateSchemaRequest::new("Again", passport_body()))
        .await
        .unwrap_err();
    assert!(matches!(err, said_core::RegistryError::RemoteError { status: 409, .. }));

    assert!(remote.delete(&id).await.unwrap());
    assert!(!remote.delete(&id).await.unwrap());
    assert!(remote.ping().await.is_ok());
}

#[tokio::test]
async fn sync_push_replaces_peer_collection() {
    let peer_store = LocalProvider::in_memory();
    let origin = spawn_server(app_over(&peer_store)).await;

    let local = LocalProvider::in_memory();
    for name in ["A", "B", "C"] {
        local
            .create(CreateSchemaRequest::new(name, json!({"title": name})))
            .await
            .unwrap();
    }

    let sync = SchemaSync::new(origin).unwrap();
    let report = sync.auto_sync(&local).await.expect("peer reachable");
    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.count, 3);
    assert_eq!(peer_store.snapshot(), local.snapshot());

    let status = sync.sync_status(&local).await;
    assert!(status.server_available);
    assert_eq!(status.server_schemas, 3);
}
