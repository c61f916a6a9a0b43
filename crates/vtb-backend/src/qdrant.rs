// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`VectorBackend`] over the Qdrant REST API.

use crate::VectorBackend;
use crate::classify::{classify_status, classify_transport, is_retryable, status_of};
use crate::pool::ConnectionPool;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use vtb_config::BackendSettings;
use vtb_core::{
    ClusterInfo, CollectionDescriptor, CollectionSpec, CollectionUpdate, FilterExpression,
    PointId, PointRecord, PointSelector, RecommendQuery, ScoredPoint, ScrollPage, ScrollRequest,
    SearchQuery, SnapshotDescriptor, WriteAck,
};
use vtb_error::{BridgeError, ErrorKind};
use vtb_namespace::CollectionName;
use vtb_retry::{RetryPolicy, retry_async};
use vtb_translate::{
    from_backend_cluster, from_backend_collection, from_backend_collection_names,
    from_backend_points, from_backend_scroll, from_backend_search_hits, from_backend_snapshot,
    from_backend_snapshots, to_backend_count, to_backend_create, to_backend_delete,
    to_backend_get, to_backend_point, to_backend_recommend, to_backend_scroll, to_backend_search,
    to_backend_search_batch, to_backend_update,
};

const API_KEY_HEADER: &str = "api-key";

/// One backend request.
struct Call {
    operation: &'static str,
    method: Method,
    path: String,
    body: Option<Value>,
    idempotent: bool,
}

impl Call {
    fn read(operation: &'static str, method: Method, path: String) -> Self {
        Self {
            operation,
            method,
            path,
            body: None,
            idempotent: true,
        }
    }

    fn write(operation: &'static str, method: Method, path: String) -> Self {
        Self {
            idempotent: false,
            ..Self::read(operation, method, path)
        }
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

fn collection_path(name: &CollectionName, rest: &str) -> String {
    format!("/collections/{}{rest}", name.physical())
}

fn decode<'a, T: Deserialize<'a>>(operation: &str, raw: &'a Value) -> Result<T, BridgeError> {
    T::deserialize(raw).map_err(|e| {
        BridgeError::internal(format!("undecodable backend response for `{operation}`"))
            .with_context("operation", operation)
            .with_source(e)
    })
}

/// Qdrant answers a few mutations with a bare `false` instead of an error.
fn expect_true(operation: &str, name: &CollectionName, raw: &Value) -> Result<(), BridgeError> {
    if raw.as_bool() == Some(false) {
        return Err(BridgeError::new(
            ErrorKind::BackendRejected,
            format!("backend declined `{operation}` on `{}`", name.physical()),
        )
        .with_context("operation", operation)
        .with_context("collection", name.physical()));
    }
    Ok(())
}

/// HTTP client for a Qdrant instance.
///
/// Clones share the underlying `reqwest` connection pool and the request
/// semaphore.
#[derive(Debug, Clone)]
pub struct QdrantHttpBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    pool: ConnectionPool,
    retry: RetryPolicy,
}

impl QdrantHttpBackend {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// `Internal` if the TLS backend cannot be initialised.
    pub fn new(settings: &BackendSettings) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .connect_timeout(settings.connect_timeout())
            .pool_max_idle_per_host(settings.pool_size)
            .build()
            .map_err(|e| BridgeError::internal("failed to build HTTP client").with_source(e))?;
        let retry = RetryPolicy::new(
            settings.retry.max_attempts,
            std::time::Duration::from_millis(settings.retry.base_delay_ms),
            std::time::Duration::from_millis(settings.retry.max_delay_ms),
        );
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            pool: ConnectionPool::new(settings.pool_size),
            retry,
        })
    }

    /// Replace the retry schedule for reads.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The request semaphore.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute(&self, call: Call) -> Result<Value, BridgeError> {
        let policy = if call.idempotent {
            self.retry.clone()
        } else {
            RetryPolicy::no_retry()
        };
        let outcome = retry_async(&policy, call.operation, || self.attempt(&call), is_retryable)
            .await?;
        if outcome.attempts > 1 {
            debug!(
                target: "vtb.backend",
                operation = call.operation,
                attempts = outcome.attempts,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "succeeded after retry"
            );
        }
        Ok(outcome.value)
    }

    /// A single attempt. The pool permit is held until the body is read.
    async fn attempt(&self, call: &Call) -> Result<Value, BridgeError> {
        let _permit = self.pool.acquire().await?;
        let started = Instant::now();

        let mut request = self
            .client
            .request(call.method.clone(), format!("{}{}", self.base_url, call.path));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(call.operation, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport(call.operation, e))?;
        debug!(
            target: "vtb.backend",
            operation = call.operation,
            method = %call.method,
            path = %call.path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend call"
        );

        if !status.is_success() {
            return Err(classify_status(call.operation, status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            BridgeError::internal(format!("non-JSON backend response for `{}`", call.operation))
                .with_context("operation", call.operation)
                .with_source(e)
        })?;
        Ok(match body {
            Value::Object(mut map) => map.remove("result").unwrap_or(Value::Object(map)),
            other => other,
        })
    }
}

#[async_trait]
impl VectorBackend for QdrantHttpBackend {
    async fn list_collections(&self) -> Result<Vec<String>, BridgeError> {
        let raw = self
            .execute(Call::read("list_collections", Method::GET, "/collections".into()))
            .await?;
        from_backend_collection_names(&raw)
    }

    async fn create_collection(
        &self,
        name: &CollectionName,
        spec: &CollectionSpec,
    ) -> Result<(), BridgeError> {
        let raw = self
            .execute(
                Call::write("create_collection", Method::PUT, collection_path(name, ""))
                    .body(to_backend_create(spec)),
            )
            .await?;
        expect_true("create_collection", name, &raw)
    }

    async fn get_collection(
        &self,
        name: &CollectionName,
    ) -> Result<CollectionDescriptor, BridgeError> {
        let raw = self
            .execute(Call::read("get_collection", Method::GET, collection_path(name, "")))
            .await?;
        from_backend_collection(name, &raw)
    }

    async fn update_collection(
        &self,
        name: &CollectionName,
        update: &CollectionUpdate,
    ) -> Result<(), BridgeError> {
        let raw = self
            .execute(
                Call::write("update_collection", Method::PATCH, collection_path(name, ""))
                    .body(to_backend_update(update)),
            )
            .await?;
        expect_true("update_collection", name, &raw)
    }

    async fn delete_collection(&self, name: &CollectionName) -> Result<(), BridgeError> {
        let raw = self
            .execute(Call::write("delete_collection", Method::DELETE, collection_path(name, "")))
            .await?;
        expect_true("delete_collection", name, &raw)
    }

    async fn upsert_points(
        &self,
        name: &CollectionName,
        points: &[PointRecord],
        wait: bool,
    ) -> Result<WriteAck, BridgeError> {
        let wire = points
            .iter()
            .map(to_backend_point)
            .collect::<Result<Vec<_>, _>>()?;
        let raw = self
            .execute(
                Call::write(
                    "upsert_points",
                    Method::PUT,
                    collection_path(name, &format!("/points?wait={wait}")),
                )
                .body(json!({ "points": wire })),
            )
            .await?;
        decode("upsert_points", &raw)
    }

    async fn get_points(
        &self,
        name: &CollectionName,
        ids: &[PointId],
        with_payload: bool,
        with_vector: bool,
    ) -> Result<Vec<PointRecord>, BridgeError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let call = Call::read("get_points", Method::POST, collection_path(name, "/points"))
            .body(to_backend_get(ids, with_payload, with_vector));
        match self.execute(call).await {
            Ok(raw) => from_backend_points(&raw, with_payload),
            Err(e) if status_of(&e) == Some(404) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn scroll_points(
        &self,
        name: &CollectionName,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, BridgeError> {
        let body = to_backend_scroll(request)?;
        let raw = self
            .execute(
                Call::read("scroll_points", Method::POST, collection_path(name, "/points/scroll"))
                    .body(body),
            )
            .await?;
        from_backend_scroll(&raw, request.with_payload)
    }

    async fn count_points(
        &self,
        name: &CollectionName,
        filter: Option<&FilterExpression>,
        exact: bool,
    ) -> Result<u64, BridgeError> {
        let body = to_backend_count(filter, exact)?;
        let raw = self
            .execute(
                Call::read("count_points", Method::POST, collection_path(name, "/points/count"))
                    .body(body),
            )
            .await?;
        #[derive(Deserialize)]
        struct Count {
            count: u64,
        }
        decode::<Count>("count_points", &raw).map(|c| c.count)
    }

    async fn delete_points(
        &self,
        name: &CollectionName,
        selector: &PointSelector,
        wait: bool,
    ) -> Result<WriteAck, BridgeError> {
        let body = to_backend_delete(selector)?;
        let raw = self
            .execute(
                Call::write(
                    "delete_points",
                    Method::POST,
                    collection_path(name, &format!("/points/delete?wait={wait}")),
                )
                .body(body),
            )
            .await?;
        decode("delete_points", &raw)
    }

    async fn search(
        &self,
        name: &CollectionName,
        query: &SearchQuery,
    ) -> Result<Vec<ScoredPoint>, BridgeError> {
        let body = to_backend_search(query)?;
        let raw = self
            .execute(
                Call::read("search", Method::POST, collection_path(name, "/points/search"))
                    .body(body),
            )
            .await?;
        from_backend_search_hits(&raw, query.with_payload)
    }

    async fn search_batch(
        &self,
        name: &CollectionName,
        queries: &[SearchQuery],
    ) -> Result<Vec<Vec<ScoredPoint>>, BridgeError> {
        let body = to_backend_search_batch(queries)?;
        let raw = self
            .execute(
                Call::read(
                    "search_batch",
                    Method::POST,
                    collection_path(name, "/points/search/batch"),
                )
                .body(body),
            )
            .await?;
        let batches: Vec<Value> = decode("search_batch", &raw)?;
        if batches.len() != queries.len() {
            return Err(BridgeError::internal(format!(
                "backend answered {} of {} batched searches",
                batches.len(),
                queries.len()
            )));
        }
        batches
            .iter()
            .zip(queries)
            .map(|(hits, q)| from_backend_search_hits(hits, q.with_payload))
            .collect()
    }

    async fn recommend(
        &self,
        name: &CollectionName,
        query: &RecommendQuery,
    ) -> Result<Vec<ScoredPoint>, BridgeError> {
        let body = to_backend_recommend(query)?;
        let raw = self
            .execute(
                Call::read("recommend", Method::POST, collection_path(name, "/points/recommend"))
                    .body(body),
            )
            .await?;
        from_backend_search_hits(&raw, query.with_payload)
    }

    async fn optimize(&self, name: &CollectionName) -> Result<(), BridgeError> {
        let update = CollectionUpdate {
            indexing_threshold: Some(0),
            ..CollectionUpdate::default()
        };
        let raw = self
            .execute(
                Call::write("optimize", Method::PATCH, collection_path(name, ""))
                    .body(to_backend_update(&update)),
            )
            .await?;
        expect_true("optimize", name, &raw)
    }

    async fn create_snapshot(
        &self,
        name: &CollectionName,
    ) -> Result<SnapshotDescriptor, BridgeError> {
        let raw = self
            .execute(Call::write(
                "create_snapshot",
                Method::POST,
                collection_path(name, "/snapshots?wait=true"),
            ))
            .await?;
        from_backend_snapshot(name.logical(), &raw)
    }

    async fn list_snapshots(
        &self,
        name: &CollectionName,
    ) -> Result<Vec<SnapshotDescriptor>, BridgeError> {
        let raw = self
            .execute(Call::read("list_snapshots", Method::GET, collection_path(name, "/snapshots")))
            .await?;
        from_backend_snapshots(name.logical(), &raw)
    }

    async fn cluster_info(&self) -> Result<ClusterInfo, BridgeError> {
        let raw = self
            .execute(Call::read("cluster_info", Method::GET, "/".into()))
            .await?;
        from_backend_cluster(&raw)
    }

    fn with_token(&self, token: &str) -> Arc<dyn VectorBackend> {
        let mut scoped = self.clone();
        scoped.api_key = Some(token.to_string());
        Arc::new(scoped)
    }
}
