// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios: an agent driving the bridge over MCP JSON-RPC.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tower::ServiceExt;
use vtb_backend_mock::MockBackend;
use vtb_config::BridgeConfig;
use vtb_server::{AppState, build_app};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Agent {
    app: Router,
    next_id: AtomicU64,
}

impl Agent {
    fn new(backend: &MockBackend) -> Self {
        let state = AppState::with_backend(Arc::new(backend.clone()), BridgeConfig::default())
            .unwrap();
        Self {
            app: build_app(Arc::new(state)),
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let req = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let reply: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reply["id"], json!(id));
        reply
    }

    /// Call a tool and return `(is_error, structured body)`.
    async fn tool(&self, name: &str, arguments: Value) -> (bool, Value) {
        let reply = self
            .rpc("tools/call", json!({ "name": name, "arguments": arguments }))
            .await;
        let result = &reply["result"];
        let is_error = result["isError"].as_bool().unwrap();
        let body = if is_error {
            let text = result["content"].as_array().unwrap().last().unwrap()["text"]
                .as_str()
                .unwrap();
            serde_json::from_str(text).unwrap()
        } else {
            result["structuredContent"].clone()
        };
        (is_error, body)
    }

    async fn ok(&self, name: &str, arguments: Value) -> Value {
        let (is_error, body) = self.tool(name, arguments).await;
        assert!(!is_error, "{name} failed: {body}");
        body
    }
}

fn doc(id: u64, vector: [f64; 3], topic: &str) -> Value {
    json!({ "id": id, "vector": vector, "payload": { "topic": topic, "rev": id } })
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn knowledge_base_lifecycle() {
    let backend = MockBackend::new();
    let agent = Agent::new(&backend);

    let init = agent
        .rpc("initialize", json!({ "protocolVersion": "2024-11-05" }))
        .await;
    assert!(init["result"]["capabilities"]["tools"].is_object());

    agent
        .ok(
            "qdrant_create_collection",
            json!({ "name": "kb", "vector_size": 3, "distance": "cosine" }),
        )
        .await;
    let upserted = agent
        .ok(
            "qdrant_upsert_points",
            json!({
                "collection": "kb",
                "points": [
                    doc(1, [1.0, 0.0, 0.0], "shaders"),
                    doc(2, [0.9, 0.1, 0.0], "shaders"),
                    doc(3, [0.0, 1.0, 0.0], "physics"),
                    doc(4, [0.0, 0.0, 1.0], "audio"),
                ],
            }),
        )
        .await;
    assert_eq!(upserted["upserted_count"], json!(4));

    let hits = agent
        .ok(
            "qdrant_search_vectors",
            json!({
                "collection": "kb",
                "vector": [1.0, 0.0, 0.0],
                "limit": 5,
                "filter": { "op": "eq", "field": "topic", "value": "shaders" },
            }),
        )
        .await;
    assert_eq!(hits["count"], json!(2));
    assert_eq!(hits["results"][0]["id"], json!(1));

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut args = json!({ "collection": "kb", "limit": 3 });
        if let Some(c) = &cursor {
            args["cursor"] = json!(c);
        }
        let page = agent.ok("qdrant_scroll_points", args).await;
        for p in page["points"].as_array().unwrap() {
            seen.push(p["id"].as_u64().unwrap());
        }
        match page["next_cursor"].as_str() {
            Some(c) => cursor = Some(c.to_string()),
            None => break,
        }
    }
    assert_eq!(seen, vec![1, 2, 3, 4]);

    let (refused, err) = agent
        .tool(
            "qdrant_delete_points",
            json!({
                "collection": "kb",
                "filter": { "op": "eq", "field": "topic", "value": "shaders" },
            }),
        )
        .await;
    assert!(refused);
    assert_eq!(err["kind"], json!("InvalidArgument"));

    agent
        .ok(
            "qdrant_delete_points",
            json!({
                "collection": "kb",
                "filter": { "op": "eq", "field": "topic", "value": "shaders" },
                "confirm": true,
            }),
        )
        .await;
    let count = agent
        .ok("qdrant_count_points", json!({ "collection": "kb" }))
        .await;
    assert_eq!(count["count"], json!(2));

    agent
        .ok("qdrant_delete_collection", json!({ "name": "kb", "confirm": true }))
        .await;
    let listing = agent.ok("qdrant_list_collections", json!({})).await;
    assert_eq!(listing["total_count"], json!(0));
}

#[tokio::test]
async fn scopes_keep_tenants_apart() {
    let backend = MockBackend::new();
    let agent = Agent::new(&backend);

    for scope in ["alpha", "beta"] {
        agent
            .ok(
                "qdrant_create_collection",
                json!({ "name": "kb", "scope": scope, "vector_size": 3 }),
            )
            .await;
    }
    agent
        .ok(
            "qdrant_upsert_points",
            json!({
                "collection": "kb",
                "scope": "alpha",
                "points": [doc(1, [1.0, 0.0, 0.0], "a"), doc(2, [0.0, 1.0, 0.0], "a")],
            }),
        )
        .await;

    let alpha = agent
        .ok("qdrant_count_points", json!({ "collection": "kb", "scope": "alpha" }))
        .await;
    let beta = agent
        .ok("qdrant_count_points", json!({ "collection": "kb", "scope": "beta" }))
        .await;
    assert_eq!(alpha["count"], json!(2));
    assert_eq!(beta["count"], json!(0));

    assert!(backend.has_collection("kb-alpha"));
    assert!(backend.has_collection("kb-beta"));

    let listing = agent
        .ok("qdrant_list_collections", json!({ "scope": "beta" }))
        .await;
    assert_eq!(listing["total_count"], json!(1));
    assert_eq!(listing["collections"][0]["name"], json!("kb"));
}

#[tokio::test]
async fn concurrent_calls_each_get_one_reply() {
    let backend = MockBackend::new();
    let agent = Arc::new(Agent::new(&backend));
    agent
        .ok("qdrant_create_collection", json!({ "name": "kb", "vector_size": 3 }))
        .await;

    let mut tasks = Vec::new();
    for i in 0..16u64 {
        let agent = agent.clone();
        tasks.push(tokio::spawn(async move {
            agent
                .ok(
                    "qdrant_upsert_points",
                    json!({ "collection": "kb", "points": [doc(i + 1, [1.0, 0.0, 0.0], "x")] }),
                )
                .await
        }));
    }
    for t in tasks {
        let out = t.await.unwrap();
        assert_eq!(out["upserted_count"], json!(1));
    }
    let count = agent
        .ok("qdrant_count_points", json!({ "collection": "kb" }))
        .await;
    assert_eq!(count["count"], json!(16));
}
