// SPDX-License-Identifier: MIT OR Apache-2.0
//! Full stack against a mock Qdrant: tool call in, REST request out.

use axum::body::Body;
use axum::http::{Request, header as http_header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use vtb_backend::QdrantHttpBackend;
use vtb_config::BridgeConfig;
use vtb_error::ErrorKind;
use vtb_server::{AppState, build_app};
use vtb_tools::{Dispatcher, ToolInvocation, builtin_registry};
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── helpers ──────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.backend.url = server.uri();
    config.backend.api_key = Some("configured".into());
    config.backend.retry.max_attempts = 1;
    config
}

fn dispatcher(server: &MockServer) -> Dispatcher {
    let config = Arc::new(config_for(server));
    let backend = QdrantHttpBackend::new(&config.backend).unwrap();
    let registry = Arc::new(builtin_registry(&config).unwrap());
    Dispatcher::new(registry, Arc::new(backend), config)
}

fn call(tool: &str, args: Value) -> ToolInvocation {
    let Value::Object(map) = args else {
        panic!("arguments must be an object");
    };
    ToolInvocation::new(tool, map)
}

fn collection_body(points: u64) -> Value {
    json!({
        "result": {
            "status": "green",
            "optimizer_status": "ok",
            "points_count": points,
            "indexed_vectors_count": points,
            "segments_count": 2,
            "config": {
                "params": {"vectors": {"text-dense": {"size": 3, "distance": "Cosine"}}},
                "hnsw_config": {"m": 16, "ef_construct": 100}
            },
            "payload_schema": {}
        },
        "status": "ok",
        "time": 0.001
    })
}

// ── tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scoped_filtered_search_reaches_the_physical_collection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb-team1/points/search"))
        .and(body_partial_json(json!({
            "vector": {"name": "text-dense", "vector": [0.1, 0.2, 0.3]},
            "filter": {"must": [{"key": "lang", "match": {"value": "rust"}}]},
            "limit": 2,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": 1, "score": 0.93, "payload": {"lang": "rust"}},
                {"id": 2, "score": 0.71, "payload": {"lang": "rust"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = dispatcher(&server)
        .dispatch(call(
            "qdrant_search_vectors",
            json!({
                "collection": "kb",
                "scope": "team1",
                "vector": [0.1, 0.2, 0.3],
                "limit": 2,
                "filter": {"op": "eq", "field": "lang", "value": "rust"},
            }),
        ))
        .await;
    let payload = result.into_result().unwrap();
    assert_eq!(payload["collection"], json!("kb"));
    assert_eq!(payload["count"], json!(2));
    assert_eq!(payload["results"][0]["id"], json!(1));
    assert!(payload["next_cursor"].is_string());
}

#[tokio::test]
async fn untranslatable_filter_never_reaches_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = dispatcher(&server)
        .dispatch(call(
            "qdrant_count_points",
            json!({
                "collection": "kb",
                "filter": {"op": "eq", "field": "score", "value": 0.5},
            }),
        ))
        .await;
    let err = result.into_result().unwrap_err();
    assert_eq!(err.kind, ErrorKind::TranslationUnsupported);
}

#[tokio::test]
async fn listing_only_shows_the_callers_scope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": [
                {"name": "kb"},
                {"name": "kb-team1"},
                {"name": "notes-team1"},
                {"name": "kb-team2"}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/collections/[^/]+-team1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(collection_body(5)))
        .mount(&server)
        .await;

    let result = dispatcher(&server)
        .dispatch(call("qdrant_list_collections", json!({"scope": "team1"})))
        .await;
    let payload = result.into_result().unwrap();
    let mut names: Vec<&str> = payload["collections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["kb", "notes"]);
    assert_eq!(payload["total_count"], json!(2));
}

#[tokio::test]
async fn missing_collection_is_a_rejection_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": {"error": "Not found: Collection `ghost` doesn't exist!"},
            "time": 0.0
        })))
        .mount(&server)
        .await;

    let result = dispatcher(&server)
        .dispatch(call("qdrant_get_collection_info", json!({"name": "ghost"})))
        .await;
    assert!(!result.success);
    let err = result.into_result().unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendRejected);
    assert!(err.detail.unwrap_or_default().contains("doesn't exist"));
}

#[tokio::test]
async fn bearer_token_replaces_the_configured_key_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(header("api-key", "caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let backend = QdrantHttpBackend::new(&config.backend).unwrap();
    let state = AppState::with_backend(Arc::new(backend), config).unwrap();
    let app = build_app(Arc::new(state));

    let req = Request::builder()
        .method("POST")
        .uri("/tools/call")
        .header(http_header::CONTENT_TYPE, "application/json")
        .header(http_header::AUTHORIZATION, "Bearer caller-token")
        .body(Body::from(
            json!({"tool_name": "qdrant_list_collections"}).to_string(),
        ))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], json!(true), "{body}");
    assert_eq!(body["payload"]["total_count"], json!(0));
}

#[tokio::test]
async fn health_endpoint_reports_an_unreachable_store() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    // Nothing listens on the discard port.
    config.backend.url = "http://127.0.0.1:9".into();
    config.backend.health_timeout_secs = 1;
    let backend = QdrantHttpBackend::new(&config.backend).unwrap();
    let state = AppState::with_backend(Arc::new(backend), config).unwrap();

    let resp = build_app(Arc::new(state))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
}
