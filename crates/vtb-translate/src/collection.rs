// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collection descriptors, snapshots and cluster identity.

use crate::points::{UNNAMED_VECTOR, malformed};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use vtb_core::{
    ClusterInfo, CollectionDescriptor, CollectionSpec, CollectionStatus, CollectionUpdate,
    Distance, HnswSettings, SnapshotDescriptor, VectorSpace,
};
use vtb_error::BridgeError;
use vtb_namespace::CollectionName;

/// Qdrant's spelling of a distance metric.
pub fn distance_to_wire(d: Distance) -> &'static str {
    match d {
        Distance::Cosine => "Cosine",
        Distance::Euclid => "Euclid",
        Distance::Dot => "Dot",
        Distance::Manhattan => "Manhattan",
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `PUT /collections/{name}`.
pub fn to_backend_create(spec: &CollectionSpec) -> Value {
    let space = |v: &VectorSpace| {
        json!({
            "size": v.size,
            "distance": distance_to_wire(v.distance),
            "on_disk": v.on_disk,
        })
    };
    let vectors = if spec.vectors.len() == 1
        && let Some(v) = spec.vectors.get(UNNAMED_VECTOR)
    {
        space(v)
    } else {
        Value::Object(
            spec.vectors
                .iter()
                .map(|(name, v)| (name.clone(), space(v)))
                .collect(),
        )
    };
    let mut body = json!({ "vectors": vectors });
    if !spec.sparse_vectors.is_empty() {
        let sparse: Map<String, Value> = spec
            .sparse_vectors
            .iter()
            .map(|name| (name.clone(), json!({})))
            .collect();
        body["sparse_vectors"] = Value::Object(sparse);
    }
    let hnsw = hnsw_to_wire(spec.hnsw.m, spec.hnsw.ef_construct);
    if !hnsw.is_empty() {
        body["hnsw_config"] = Value::Object(hnsw);
    }
    body
}

fn hnsw_to_wire(m: Option<u64>, ef_construct: Option<u64>) -> Map<String, Value> {
    let mut hnsw = Map::new();
    if let Some(m) = m {
        hnsw.insert("m".into(), json!(m));
    }
    if let Some(ef) = ef_construct {
        hnsw.insert("ef_construct".into(), json!(ef));
    }
    hnsw
}

/// Body of `PATCH /collections/{name}`. Sections with no changes are omitted.
pub fn to_backend_update(update: &CollectionUpdate) -> Value {
    let mut body = Map::new();
    let hnsw = hnsw_to_wire(update.hnsw_m, update.hnsw_ef_construct);
    if !hnsw.is_empty() {
        body.insert("hnsw_config".into(), Value::Object(hnsw));
    }
    let mut optimizers = Map::new();
    if let Some(t) = update.indexing_threshold {
        optimizers.insert("indexing_threshold".into(), json!(t));
    }
    if let Some(f) = update.flush_interval_sec {
        optimizers.insert("flush_interval_sec".into(), json!(f));
    }
    if !optimizers.is_empty() {
        body.insert("optimizers_config".into(), Value::Object(optimizers));
    }
    Value::Object(body)
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WireSpace {
    size: u64,
    distance: String,
    #[serde(default)]
    on_disk: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireVectors {
    Single(WireSpace),
    Named(BTreeMap<String, WireSpace>),
}

#[derive(Deserialize, Default)]
struct WireParams {
    #[serde(default)]
    vectors: Option<WireVectors>,
    #[serde(default)]
    sparse_vectors: Option<Map<String, Value>>,
}

#[derive(Deserialize, Default)]
struct WireConfig {
    #[serde(default)]
    params: WireParams,
    #[serde(default)]
    hnsw_config: HnswSettings,
}

#[derive(Deserialize)]
struct WireInfo {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    optimizer_status: Option<Value>,
    #[serde(default)]
    points_count: Option<u64>,
    #[serde(default)]
    indexed_vectors_count: Option<u64>,
    #[serde(default)]
    segments_count: Option<u64>,
    #[serde(default)]
    config: WireConfig,
    #[serde(default)]
    payload_schema: Map<String, Value>,
}

fn space_from_wire(space: WireSpace) -> Result<VectorSpace, BridgeError> {
    Ok(VectorSpace {
        size: space.size,
        distance: space
            .distance
            .parse()
            .map_err(|e| malformed("collection distance", e))?,
        on_disk: space.on_disk.unwrap_or(false),
    })
}

fn optimizer_status(raw: Option<Value>) -> String {
    match raw {
        Some(Value::String(s)) => s,
        Some(Value::Object(obj)) => obj
            .get("error")
            .and_then(Value::as_str)
            .map(|e| format!("error: {e}"))
            .unwrap_or_else(|| "unknown".into()),
        _ => "unknown".into(),
    }
}

/// Decode the `result` of `GET /collections/{name}`.
pub fn from_backend_collection(
    name: &CollectionName,
    raw: &Value,
) -> Result<CollectionDescriptor, BridgeError> {
    let info = WireInfo::deserialize(raw).map_err(|e| malformed("collection info", e))?;
    let mut vectors = BTreeMap::new();
    match info.config.params.vectors {
        Some(WireVectors::Single(space)) => {
            vectors.insert(UNNAMED_VECTOR.to_string(), space_from_wire(space)?);
        }
        Some(WireVectors::Named(named)) => {
            for (k, space) in named {
                vectors.insert(k, space_from_wire(space)?);
            }
        }
        None => {}
    }
    Ok(CollectionDescriptor {
        logical_name: name.logical().to_string(),
        physical_name: name.physical().to_string(),
        vectors,
        sparse_vectors: info
            .config
            .params
            .sparse_vectors
            .map(|m| m.into_iter().map(|(k, _)| k).collect())
            .unwrap_or_default(),
        points_count: info.points_count.unwrap_or(0),
        indexed_vectors_count: info.indexed_vectors_count.unwrap_or(0),
        segments_count: info.segments_count.unwrap_or(0),
        status: info
            .status
            .as_deref()
            .map(CollectionStatus::parse)
            .unwrap_or(CollectionStatus::Unknown),
        optimizer_status: optimizer_status(info.optimizer_status),
        hnsw: info.config.hnsw_config,
        payload_schema: info.payload_schema,
    })
}

/// Decode the `result` of `GET /collections` into physical names.
pub fn from_backend_collection_names(raw: &Value) -> Result<Vec<String>, BridgeError> {
    #[derive(Deserialize)]
    struct Entry {
        name: String,
    }
    #[derive(Deserialize)]
    struct List {
        collections: Vec<Entry>,
    }
    let list = List::deserialize(raw).map_err(|e| malformed("collection list", e))?;
    Ok(list.collections.into_iter().map(|e| e.name).collect())
}

#[derive(Deserialize)]
struct WireSnapshot {
    name: String,
    #[serde(default)]
    creation_time: Option<String>,
    #[serde(default)]
    size: u64,
}

/// Decode one snapshot description.
pub fn from_backend_snapshot(
    collection: &str,
    raw: &Value,
) -> Result<SnapshotDescriptor, BridgeError> {
    let snap = WireSnapshot::deserialize(raw).map_err(|e| malformed("snapshot", e))?;
    Ok(SnapshotDescriptor {
        collection: collection.to_string(),
        name: snap.name,
        creation_time: snap.creation_time,
        size: snap.size,
    })
}

/// Decode a snapshot list.
pub fn from_backend_snapshots(
    collection: &str,
    raw: &Value,
) -> Result<Vec<SnapshotDescriptor>, BridgeError> {
    raw.as_array()
        .ok_or_else(|| malformed("snapshot list", "expected an array"))?
        .iter()
        .map(|s| from_backend_snapshot(collection, s))
        .collect()
}

/// Decode the body of `GET /`.
pub fn from_backend_cluster(raw: &Value) -> Result<ClusterInfo, BridgeError> {
    #[derive(Deserialize)]
    struct Root {
        #[serde(default)]
        title: Option<String>,
        version: String,
        #[serde(default)]
        commit: Option<String>,
    }
    let root = Root::deserialize(raw).map_err(|e| malformed("cluster info", e))?;
    Ok(ClusterInfo {
        title: root.title.unwrap_or_else(|| "qdrant".into()),
        version: root.version,
        commit: root.commit,
    })
}
