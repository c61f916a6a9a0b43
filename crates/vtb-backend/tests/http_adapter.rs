// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP adapter behaviour against a mock Qdrant: retries, classification,
//! authentication and pool backpressure.

use serde_json::json;
use std::time::{Duration, Instant};
use vtb_backend::{QdrantHttpBackend, VectorBackend};
use vtb_config::BackendSettings;
use vtb_core::{PointId, PointRecord, SearchQuery, VectorData};
use vtb_error::ErrorKind;
use vtb_namespace::CollectionName;
use vtb_retry::RetryPolicy;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> QdrantHttpBackend {
    backend_with(server, |_| {})
}

fn backend_with(server: &MockServer, tweak: impl FnOnce(&mut BackendSettings)) -> QdrantHttpBackend {
    let mut settings = BackendSettings {
        url: server.uri(),
        ..BackendSettings::default()
    };
    tweak(&mut settings);
    QdrantHttpBackend::new(&settings)
        .unwrap()
        .with_retry(RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ))
}

fn kb() -> CollectionName {
    CollectionName::resolve("kb", "").unwrap()
}

fn collection_body() -> serde_json::Value {
    json!({
        "result": {
            "status": "green",
            "optimizer_status": "ok",
            "points_count": 0,
            "indexed_vectors_count": 0,
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

fn search_query() -> SearchQuery {
    SearchQuery {
        vector_name: "text-dense".into(),
        vector: vec![0.1, 0.2, 0.3],
        filter: None,
        score_threshold: None,
        limit: 1,
        offset: 0,
        with_payload: true,
        with_vector: false,
    }
}

// ── Retries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn read_on_503_is_attempted_max_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/kb"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = backend(&server).get_collection(&kb()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn mutation_on_500_is_attempted_once() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/collections/kb/points"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let point = PointRecord {
        id: PointId::Num(1),
        vectors: [("text-dense".to_string(), VectorData::Dense(vec![0.1, 0.2, 0.3]))].into(),
        payload: Default::default(),
    };
    let err = backend(&server)
        .upsert_points(&kb(), &[point], true)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn read_recovers_after_one_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/kb"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/kb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(collection_body()))
        .expect(1)
        .mount(&server)
        .await;

    let info = backend(&server).get_collection(&kb()).await.unwrap();
    assert_eq!(info.dimension("text-dense"), Some(3));
    assert_eq!(info.segments_count, 2);
}

#[tokio::test]
async fn rejection_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/kb"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": {"error": "Not found: Collection `kb` doesn't exist!"},
            "time": 0.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = backend(&server).get_collection(&kb()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendRejected);
    assert_eq!(
        err.detail.as_deref(),
        Some("Not found: Collection `kb` doesn't exist!")
    );
}

// ── Not-found semantics ─────────────────────────────────────────────

#[tokio::test]
async fn get_points_404_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb/points"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let points = backend(&server)
        .get_points(&kb(), &[PointId::Num(7)], true, false)
        .await
        .unwrap();
    assert!(points.is_empty());
}

#[tokio::test]
async fn get_points_with_no_ids_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let points = backend(&server).get_points(&kb(), &[], true, false).await.unwrap();
    assert!(points.is_empty());
}

// ── Decoding ────────────────────────────────────────────────────────

#[tokio::test]
async fn search_hits_restore_original_ids() {
    let (wire, _) = vtb_translate::wire_id(&PointId::from("doc-1"));
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": 1, "score": 0.99, "payload": {"title": "a"}},
                {"id": wire, "score": 0.5, "payload": {"original_id": "doc-1"}}
            ]
        })))
        .mount(&server)
        .await;

    let hits = backend(&server).search(&kb(), &search_query()).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, PointId::Num(1));
    assert!((hits[0].score - 0.99).abs() < 1e-9);
    assert_eq!(hits[1].id, PointId::from("doc-1"));
}

#[tokio::test]
async fn write_ack_and_count_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb/points/delete"))
        .and(query_param("wait", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"operation_id": 12, "status": "completed"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/kb/points/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"count": 42}})))
        .mount(&server)
        .await;

    let b = backend(&server);
    let ack = b
        .delete_points(&kb(), &vtb_core::PointSelector::Ids(vec![PointId::Num(1)]), true)
        .await
        .unwrap();
    assert_eq!(ack.operation_id, Some(12));
    assert_eq!(ack.status, "completed");
    assert_eq!(b.count_points(&kb(), None, true).await.unwrap(), 42);
}

#[tokio::test]
async fn undecodable_success_is_internal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = backend(&server).list_collections().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
}

#[tokio::test]
async fn cluster_info_reads_root_without_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "qdrant - vector search engine",
            "version": "1.12.4",
            "commit": "abc"
        })))
        .mount(&server)
        .await;

    let info = backend(&server).cluster_info().await.unwrap();
    assert_eq!(info.version, "1.12.4");
    assert_eq!(info.commit.as_deref(), Some("abc"));
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn configured_api_key_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(header("api-key", "configured"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": [{"name": "kb"}, {"name": "kb-team1"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let b = backend_with(&server, |s| s.api_key = Some("configured".into()));
    assert_eq!(b.list_collections().await.unwrap(), vec!["kb", "kb-team1"]);
}

#[tokio::test]
async fn caller_token_overrides_configured_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(header("api-key", "caller"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let b = backend_with(&server, |s| s.api_key = Some("configured".into()));
    let scoped = b.with_token("caller");
    assert!(scoped.list_collections().await.unwrap().is_empty());
}

// ── Transport failures ──────────────────────────────────────────────

#[tokio::test]
async fn timeout_is_backend_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"version": "1.0.0"}))
                .set_delay(Duration::from_millis(1_500)),
        )
        .mount(&server)
        .await;

    let b = backend_with(&server, |s| s.timeout_secs = 1).with_retry(RetryPolicy::no_retry());
    let err = b.cluster_info().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn connection_refused_is_backend_unavailable() {
    let settings = BackendSettings {
        url: "http://127.0.0.1:1".into(),
        ..BackendSettings::default()
    };
    let b = QdrantHttpBackend::new(&settings).unwrap().with_retry(RetryPolicy::new(
        2,
        Duration::from_millis(1),
        Duration::from_millis(1),
    ));
    let err = b.cluster_info().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendUnavailable);
}

// ── Backpressure ────────────────────────────────────────────────────

#[tokio::test]
async fn saturated_pool_queues_callers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb/points/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": []}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let b = backend_with(&server, |s| s.pool_size = 1);
    let name = kb();
    let query = search_query();
    let started = Instant::now();
    let (a, c) = tokio::join!(b.search(&name, &query), b.search(&name, &query));
    a.unwrap();
    c.unwrap();
    assert!(
        started.elapsed() >= Duration::from_millis(400),
        "second call should wait for the first permit, took {:?}",
        started.elapsed()
    );
    assert_eq!(b.pool().available(), 1);
}

// ── String ids ──────────────────────────────────────────────────────

#[tokio::test]
async fn string_ids_survive_reads_without_payload() {
    use wiremock::matchers::body_partial_json;

    let server = MockServer::start().await;
    let mapped = vtb_translate::wire_id(&PointId::from("doc-1")).0;
    let stored = json!({"id": mapped, "payload": {"original_id": "doc-1"}});

    Mock::given(method("POST"))
        .and(path("/collections/kb/points"))
        .and(body_partial_json(json!({
            "ids": [mapped],
            "with_payload": {"include": ["original_id"]},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": [stored]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/kb/points/search"))
        .and(body_partial_json(json!({"with_payload": {"include": ["original_id"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"id": mapped, "score": 0.9, "payload": {"original_id": "doc-1"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let b = backend(&server);
    let points = b
        .get_points(&kb(), &[PointId::from("doc-1")], false, false)
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].id, PointId::from("doc-1"));
    assert!(points[0].payload.is_empty());

    let mut query = search_query();
    query.with_payload = false;
    let hits = b.search(&kb(), &query).await.unwrap();
    assert_eq!(hits[0].id, PointId::from("doc-1"));
    assert!(hits[0].payload.is_none());
}
