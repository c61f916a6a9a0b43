// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory [`VectorBackend`] used for local testing.
//!
//! Clones share state, so a test can keep one handle for assertions while
//! the dispatcher owns another.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use vtb_backend::VectorBackend;
use vtb_core::{
    ClusterInfo, CollectionDescriptor, CollectionSpec, CollectionStatus, CollectionUpdate,
    Distance, FilterExpression, NamedVectors, PointId, PointRecord, PointSelector,
    RecommendQuery, ScoredPoint, ScrollPage, ScrollRequest, SearchQuery, SnapshotDescriptor,
    VectorData, WriteAck,
};
use vtb_error::{BridgeError, ErrorKind};
use vtb_namespace::CollectionName;

/// Version reported by [`MockBackend::cluster_info`].
pub const MOCK_VERSION: &str = "1.12.0-mock";

#[derive(Debug, Clone)]
struct MockCollection {
    name: CollectionName,
    spec: CollectionSpec,
    points: BTreeMap<PointId, PointRecord>,
    optimized: bool,
}

impl MockCollection {
    fn descriptor(&self) -> CollectionDescriptor {
        let count = self.points.len() as u64;
        CollectionDescriptor {
            logical_name: self.name.logical().to_string(),
            physical_name: self.name.physical().to_string(),
            vectors: self.spec.vectors.clone(),
            sparse_vectors: self.spec.sparse_vectors.clone(),
            points_count: count,
            indexed_vectors_count: if self.optimized { count } else { 0 },
            segments_count: 1,
            status: CollectionStatus::Green,
            optimizer_status: "ok".into(),
            hnsw: self.spec.hnsw,
            payload_schema: Default::default(),
        }
    }
}

#[derive(Debug)]
struct State {
    collections: BTreeMap<String, MockCollection>,
    snapshots: BTreeMap<String, Vec<SnapshotDescriptor>>,
    calls: Vec<String>,
    tokens: Vec<Option<String>>,
    reachable: bool,
    write_latency: Duration,
    next_operation: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            collections: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            calls: Vec::new(),
            tokens: Vec::new(),
            reachable: true,
            write_latency: Duration::ZERO,
            next_operation: 0,
        }
    }
}

/// A vector store that lives in memory.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<State>>,
    token: Option<String>,
}

impl MockBackend {
    /// An empty, reachable backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and fail if the backend is switched off.
    fn enter(&self, operation: &str) -> Result<MutexGuard<'_, State>, BridgeError> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        state.tokens.push(self.token.clone());
        if !state.reachable {
            return Err(BridgeError::new(
                ErrorKind::BackendUnavailable,
                format!("backend unreachable for `{operation}`"),
            )
            .with_context("operation", operation));
        }
        Ok(state)
    }

    /// Total number of backend calls made.
    pub fn calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of calls of one operation, e.g. `"delete_collection"`.
    pub fn calls_for(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    /// Operation names in call order.
    pub fn call_log(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Token used by the most recent call, if any.
    pub fn last_token(&self) -> Option<String> {
        self.lock().tokens.last().cloned().flatten()
    }

    /// Simulate the backend going away or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Delay every point write by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Duration) {
        self.lock().write_latency = latency;
    }

    async fn settle_write(&self) {
        let latency = self.lock().write_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Whether a physical collection exists, without counting a call.
    pub fn has_collection(&self, physical: &str) -> bool {
        self.lock().collections.contains_key(physical)
    }
}

// ---------------------------------------------------------------------------
// Errors shaped like the real backend's
// ---------------------------------------------------------------------------

fn rejected(operation: &str, status: u16, detail: String) -> BridgeError {
    BridgeError::new(
        ErrorKind::BackendRejected,
        format!("backend rejected `{operation}`: HTTP {status}"),
    )
    .with_detail(detail)
    .with_context("operation", operation)
    .with_context("status", status)
}

fn missing(operation: &str, name: &CollectionName) -> BridgeError {
    rejected(
        operation,
        404,
        format!("Not found: Collection `{}` doesn't exist!", name.physical()),
    )
}

fn collection<'a>(
    state: &'a State,
    operation: &str,
    name: &CollectionName,
) -> Result<&'a MockCollection, BridgeError> {
    state
        .collections
        .get(name.physical())
        .ok_or_else(|| missing(operation, name))
}

fn collection_mut<'a>(
    state: &'a mut State,
    operation: &str,
    name: &CollectionName,
) -> Result<&'a mut MockCollection, BridgeError> {
    state
        .collections
        .get_mut(name.physical())
        .ok_or_else(|| missing(operation, name))
}

fn ack(state: &mut State, wait: bool) -> WriteAck {
    state.next_operation += 1;
    WriteAck {
        operation_id: Some(state.next_operation),
        status: if wait { "completed" } else { "acknowledged" }.into(),
    }
}

fn check_vectors(spec: &CollectionSpec, vectors: &NamedVectors) -> Result<(), String> {
    for (name, data) in vectors {
        match data {
            VectorData::Dense(v) => {
                let space = spec
                    .vectors
                    .get(name)
                    .ok_or_else(|| format!("Wrong input: Not existing vector name error: {name}"))?;
                if v.len() as u64 != space.size {
                    return Err(format!(
                        "Wrong input: Vector dimension error: expected dim: {}, got {}",
                        space.size,
                        v.len()
                    ));
                }
            }
            VectorData::Sparse(s) => {
                if !spec.sparse_vectors.contains(name) {
                    return Err(format!("Wrong input: Not existing vector name error: {name}"));
                }
                if s.indices.len() != s.values.len() {
                    return Err("Wrong input: sparse indices and values differ in length".into());
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn score(distance: Distance, a: &[f64], b: &[f64]) -> f64 {
    let pairs = a.iter().zip(b);
    match distance {
        Distance::Dot => pairs.map(|(x, y)| x * y).sum(),
        Distance::Cosine => {
            let dot: f64 = pairs.map(|(x, y)| x * y).sum();
            let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
            if na == 0.0 || nb == 0.0 {
                0.0
            } else {
                dot / (na * nb)
            }
        }
        Distance::Euclid => pairs.map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
        Distance::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
    }
}

/// Similarities rank high-first, distances low-first.
fn higher_is_better(distance: Distance) -> bool {
    matches!(distance, Distance::Cosine | Distance::Dot)
}

fn project(point: &PointRecord, with_payload: bool, with_vector: bool) -> PointRecord {
    PointRecord {
        id: point.id.clone(),
        vectors: if with_vector {
            point.vectors.clone()
        } else {
            NamedVectors::new()
        },
        payload: if with_payload {
            point.payload.clone()
        } else {
            Default::default()
        },
    }
}

struct Ranking<'a> {
    vector_name: &'a str,
    vector: &'a [f64],
    filter: Option<&'a FilterExpression>,
    score_threshold: Option<f64>,
    exclude: &'a [PointId],
    offset: u64,
    limit: u64,
    with_payload: bool,
    with_vector: bool,
}

fn rank(
    operation: &str,
    coll: &MockCollection,
    r: &Ranking<'_>,
) -> Result<Vec<ScoredPoint>, BridgeError> {
    let space = coll.spec.vectors.get(r.vector_name).ok_or_else(|| {
        rejected(
            operation,
            400,
            format!("Wrong input: Not existing vector name error: {}", r.vector_name),
        )
    })?;
    if r.vector.len() as u64 != space.size {
        return Err(rejected(
            operation,
            400,
            format!(
                "Wrong input: Vector dimension error: expected dim: {}, got {}",
                space.size,
                r.vector.len()
            ),
        ));
    }
    let better = higher_is_better(space.distance);
    let mut hits: Vec<ScoredPoint> = coll
        .points
        .values()
        .filter(|p| !r.exclude.contains(&p.id))
        .filter(|p| r.filter.is_none_or(|f| f.matches(&p.payload)))
        .filter_map(|p| match p.vectors.get(r.vector_name) {
            Some(VectorData::Dense(v)) => Some((p, score(space.distance, r.vector, v))),
            _ => None,
        })
        .filter(|(_, s)| match r.score_threshold {
            Some(t) if better => *s >= t,
            Some(t) => *s <= t,
            None => true,
        })
        .map(|(p, s)| {
            let projected = project(p, r.with_payload, r.with_vector);
            ScoredPoint {
                id: projected.id,
                score: s,
                payload: r.with_payload.then_some(projected.payload),
                vectors: r.with_vector.then_some(projected.vectors),
            }
        })
        .collect();
    hits.sort_by(|a, b| {
        let ord = a.score.total_cmp(&b.score);
        if better { ord.reverse() } else { ord }
    });
    Ok(hits
        .into_iter()
        .skip(r.offset as usize)
        .take(r.limit as usize)
        .collect())
}

fn mean(vectors: &[&[f64]]) -> Vec<f64> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut acc = vec![0.0; first.len()];
    for v in vectors {
        for (a, x) in acc.iter_mut().zip(v.iter()) {
            *a += x;
        }
    }
    let n = vectors.len() as f64;
    acc.iter_mut().for_each(|a| *a /= n);
    acc
}

// ---------------------------------------------------------------------------
// VectorBackend
// ---------------------------------------------------------------------------

#[async_trait]
impl VectorBackend for MockBackend {
    async fn list_collections(&self) -> Result<Vec<String>, BridgeError> {
        let state = self.enter("list_collections")?;
        Ok(state.collections.keys().cloned().collect())
    }

    async fn create_collection(
        &self,
        name: &CollectionName,
        spec: &CollectionSpec,
    ) -> Result<(), BridgeError> {
        let mut state = self.enter("create_collection")?;
        if state.collections.contains_key(name.physical()) {
            return Err(rejected(
                "create_collection",
                409,
                format!("Wrong input: Collection `{}` already exists!", name.physical()),
            ));
        }
        state.collections.insert(
            name.physical().to_string(),
            MockCollection {
                name: name.clone(),
                spec: spec.clone(),
                points: BTreeMap::new(),
                optimized: false,
            },
        );
        Ok(())
    }

    async fn get_collection(
        &self,
        name: &CollectionName,
    ) -> Result<CollectionDescriptor, BridgeError> {
        let state = self.enter("get_collection")?;
        Ok(collection(&state, "get_collection", name)?.descriptor())
    }

    async fn update_collection(
        &self,
        name: &CollectionName,
        update: &CollectionUpdate,
    ) -> Result<(), BridgeError> {
        let mut state = self.enter("update_collection")?;
        let coll = collection_mut(&mut state, "update_collection", name)?;
        if let Some(m) = update.hnsw_m {
            coll.spec.hnsw.m = Some(m);
        }
        if let Some(ef) = update.hnsw_ef_construct {
            coll.spec.hnsw.ef_construct = Some(ef);
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &CollectionName) -> Result<(), BridgeError> {
        let mut state = self.enter("delete_collection")?;
        state
            .collections
            .remove(name.physical())
            .map(|_| ())
            .ok_or_else(|| missing("delete_collection", name))
    }

    async fn upsert_points(
        &self,
        name: &CollectionName,
        points: &[PointRecord],
        wait: bool,
    ) -> Result<WriteAck, BridgeError> {
        self.settle_write().await;
        let mut state = self.enter("upsert_points")?;
        let coll = collection_mut(&mut state, "upsert_points", name)?;
        for p in points {
            check_vectors(&coll.spec, &p.vectors)
                .map_err(|detail| rejected("upsert_points", 400, detail))?;
        }
        for p in points {
            coll.points.insert(p.id.clone(), p.clone());
        }
        coll.optimized = false;
        Ok(ack(&mut state, wait))
    }

    async fn get_points(
        &self,
        name: &CollectionName,
        ids: &[PointId],
        with_payload: bool,
        with_vector: bool,
    ) -> Result<Vec<PointRecord>, BridgeError> {
        let state = self.enter("get_points")?;
        let Some(coll) = state.collections.get(name.physical()) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| coll.points.get(id))
            .map(|p| project(p, with_payload, with_vector))
            .collect())
    }

    async fn scroll_points(
        &self,
        name: &CollectionName,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, BridgeError> {
        let state = self.enter("scroll_points")?;
        let coll = collection(&state, "scroll_points", name)?;
        let mut matching = coll
            .points
            .values()
            .filter(|p| request.offset.as_ref().is_none_or(|o| p.id >= *o))
            .filter(|p| request.filter.as_ref().is_none_or(|f| f.matches(&p.payload)));
        let points: Vec<PointRecord> = matching
            .by_ref()
            .take(request.limit as usize)
            .map(|p| project(p, request.with_payload, request.with_vector))
            .collect();
        let next_offset = matching.next().map(|p| p.id.clone());
        Ok(ScrollPage {
            points,
            next_offset,
        })
    }

    async fn count_points(
        &self,
        name: &CollectionName,
        filter: Option<&FilterExpression>,
        _exact: bool,
    ) -> Result<u64, BridgeError> {
        let state = self.enter("count_points")?;
        let coll = collection(&state, "count_points", name)?;
        Ok(coll
            .points
            .values()
            .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
            .count() as u64)
    }

    async fn delete_points(
        &self,
        name: &CollectionName,
        selector: &PointSelector,
        wait: bool,
    ) -> Result<WriteAck, BridgeError> {
        self.settle_write().await;
        let mut state = self.enter("delete_points")?;
        let coll = collection_mut(&mut state, "delete_points", name)?;
        match selector {
            PointSelector::Ids(ids) => {
                for id in ids {
                    coll.points.remove(id);
                }
            }
            PointSelector::Filter(f) => coll.points.retain(|_, p| !f.matches(&p.payload)),
        }
        Ok(ack(&mut state, wait))
    }

    async fn search(
        &self,
        name: &CollectionName,
        query: &SearchQuery,
    ) -> Result<Vec<ScoredPoint>, BridgeError> {
        let state = self.enter("search")?;
        let coll = collection(&state, "search", name)?;
        rank("search", coll, &ranking(query))
    }

    async fn search_batch(
        &self,
        name: &CollectionName,
        queries: &[SearchQuery],
    ) -> Result<Vec<Vec<ScoredPoint>>, BridgeError> {
        let state = self.enter("search_batch")?;
        let coll = collection(&state, "search_batch", name)?;
        queries
            .iter()
            .map(|q| rank("search_batch", coll, &ranking(q)))
            .collect()
    }

    async fn recommend(
        &self,
        name: &CollectionName,
        query: &RecommendQuery,
    ) -> Result<Vec<ScoredPoint>, BridgeError> {
        let state = self.enter("recommend")?;
        let coll = collection(&state, "recommend", name)?;
        let lookup = |ids: &[PointId]| -> Result<Vec<&[f64]>, BridgeError> {
            ids.iter()
                .map(|id| {
                    match coll.points.get(id).and_then(|p| p.vectors.get(&query.vector_name)) {
                        Some(VectorData::Dense(v)) => Ok(v.as_slice()),
                        _ => Err(rejected(
                            "recommend",
                            404,
                            format!("Not found: No point with id {id} found"),
                        )),
                    }
                })
                .collect()
        };
        let positive = mean(&lookup(&query.positive)?);
        let negative = lookup(&query.negative)?;
        let target: Vec<f64> = if negative.is_empty() {
            positive
        } else {
            let negative = mean(&negative);
            positive
                .iter()
                .zip(&negative)
                .map(|(p, n)| p + (p - n))
                .collect()
        };
        let exclude: Vec<PointId> = query
            .positive
            .iter()
            .chain(&query.negative)
            .cloned()
            .collect();
        rank(
            "recommend",
            coll,
            &Ranking {
                vector_name: &query.vector_name,
                vector: &target,
                filter: query.filter.as_ref(),
                score_threshold: query.score_threshold,
                exclude: &exclude,
                offset: 0,
                limit: query.limit,
                with_payload: query.with_payload,
                with_vector: query.with_vector,
            },
        )
    }

    async fn optimize(&self, name: &CollectionName) -> Result<(), BridgeError> {
        let mut state = self.enter("optimize")?;
        collection_mut(&mut state, "optimize", name)?.optimized = true;
        Ok(())
    }

    async fn create_snapshot(
        &self,
        name: &CollectionName,
    ) -> Result<SnapshotDescriptor, BridgeError> {
        let mut state = self.enter("create_snapshot")?;
        let points = collection(&state, "create_snapshot", name)?.points.len() as u64;
        let now = Utc::now();
        let snapshot = SnapshotDescriptor {
            collection: name.logical().to_string(),
            name: format!(
                "{}-{}.snapshot",
                name.physical(),
                now.format("%Y-%m-%d-%H-%M-%S-%f")
            ),
            creation_time: Some(now.format("%Y-%m-%dT%H:%M:%S").to_string()),
            size: 1024 + points * 64,
        };
        state
            .snapshots
            .entry(name.physical().to_string())
            .or_default()
            .push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list_snapshots(
        &self,
        name: &CollectionName,
    ) -> Result<Vec<SnapshotDescriptor>, BridgeError> {
        let state = self.enter("list_snapshots")?;
        collection(&state, "list_snapshots", name)?;
        Ok(state
            .snapshots
            .get(name.physical())
            .cloned()
            .unwrap_or_default())
    }

    async fn cluster_info(&self) -> Result<ClusterInfo, BridgeError> {
        let _state = self.enter("cluster_info")?;
        Ok(ClusterInfo {
            title: "qdrant - vector search engine".into(),
            version: MOCK_VERSION.into(),
            commit: None,
        })
    }

    fn with_token(&self, token: &str) -> Arc<dyn VectorBackend> {
        Arc::new(Self {
            state: Arc::clone(&self.state),
            token: Some(token.to_string()),
        })
    }
}

fn ranking(q: &SearchQuery) -> Ranking<'_> {
    Ranking {
        vector_name: &q.vector_name,
        vector: &q.vector,
        filter: q.filter.as_ref(),
        score_threshold: q.score_threshold,
        exclude: &[],
        offset: q.offset,
        limit: q.limit,
        with_payload: q.with_payload,
        with_vector: q.with_vector,
    }
}
