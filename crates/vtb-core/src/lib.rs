// SPDX-License-Identifier: MIT OR Apache-2.0
//! vtb-core
//!
//! Backend-independent types shared by the vector tool bridge: collection
//! descriptors, point records, scored hits, query shapes and snapshots.
//! Wire formats of the vector store live in `vtb-translate`.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod filter;

pub use filter::FilterExpression;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Arbitrary key/value data stored alongside a point.
pub type Payload = Map<String, Value>;

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// Point identifier: an unsigned integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PointId {
    /// Unsigned integer id.
    Num(u64),
    /// String id. Non-UUID strings are mapped to a stable UUID on the wire.
    Str(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

/// Sparse vector as parallel index/value arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SparseVector {
    /// Dimension indices.
    pub indices: Vec<u32>,
    /// Values at those indices.
    pub values: Vec<f64>,
}

/// One vector stored in a named vector space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum VectorData {
    /// Dense vector.
    Dense(Vec<f64>),
    /// Sparse vector.
    Sparse(SparseVector),
}

impl VectorData {
    /// Dimensionality of a dense vector; `None` for sparse vectors.
    pub fn dense_len(&self) -> Option<usize> {
        match self {
            Self::Dense(v) => Some(v.len()),
            Self::Sparse(_) => None,
        }
    }
}

/// Vectors keyed by vector-space name.
pub type NamedVectors = BTreeMap<String, VectorData>;

/// One stored point. Upserting a record with an existing id replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PointRecord {
    /// Identity within the collection.
    pub id: PointId,
    /// Vectors keyed by vector-space name. Empty when vectors were not requested.
    #[serde(default)]
    pub vectors: NamedVectors,
    /// Payload.
    #[serde(default)]
    pub payload: Payload,
}

/// One hit returned by search or recommend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredPoint {
    /// Point id.
    pub id: PointId,
    /// Similarity score as reported by the backend.
    pub score: f64,
    /// Payload, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Vectors, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<NamedVectors>,
}

/// Points addressed by a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSelector {
    /// Explicit ids.
    Ids(Vec<PointId>),
    /// Every point matching a filter.
    Filter(FilterExpression),
}

/// Acknowledgement of a point write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WriteAck {
    /// Backend operation sequence number, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<u64>,
    /// `completed` or `acknowledged`.
    pub status: String,
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Distance metric of a dense vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Cosine similarity.
    Cosine,
    /// Euclidean distance.
    Euclid,
    /// Dot product.
    Dot,
    /// Manhattan distance.
    Manhattan,
}

impl Distance {
    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclid => "euclid",
            Self::Dot => "dot",
            Self::Manhattan => "manhattan",
        }
    }

    /// Every metric, in declaration order.
    pub const ALL: [Distance; 4] = [Self::Cosine, Self::Euclid, Self::Dot, Self::Manhattan];
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown distance '{s}'"))
    }
}

/// Configuration of one dense vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VectorSpace {
    /// Dimensionality.
    pub size: u64,
    /// Distance metric.
    pub distance: Distance,
    /// Whether vectors are kept on disk.
    #[serde(default)]
    pub on_disk: bool,
}

/// Health colour reported for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// All segments ready.
    Green,
    /// Optimization in progress.
    Yellow,
    /// An operation failed.
    Red,
    /// Optimization pending.
    Grey,
    /// Not reported.
    Unknown,
}

impl CollectionStatus {
    /// Lower-case name, as serialised.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Grey => "grey",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a backend status string, mapping anything unrecognised to
    /// [`CollectionStatus::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "green" => Self::Green,
            "yellow" => Self::Yellow,
            "red" => Self::Red,
            "grey" | "gray" => Self::Grey,
            _ => Self::Unknown,
        }
    }
}

/// HNSW index parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HnswSettings {
    /// Edges per node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<u64>,
    /// Neighbours considered while building.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_construct: Option<u64>,
    /// Below this many vectors a full scan is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_scan_threshold: Option<u64>,
    /// Whether the index lives on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_disk: Option<bool>,
}

/// A collection as seen by callers. Always read fresh from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CollectionDescriptor {
    /// Name the caller used.
    pub logical_name: String,
    /// Name in the backend after scope resolution.
    pub physical_name: String,
    /// Dense vector spaces by name.
    pub vectors: BTreeMap<String, VectorSpace>,
    /// Sparse vector space names.
    #[serde(default)]
    pub sparse_vectors: Vec<String>,
    /// Stored points.
    pub points_count: u64,
    /// Vectors already indexed.
    pub indexed_vectors_count: u64,
    /// Storage segments.
    pub segments_count: u64,
    /// Health colour.
    pub status: CollectionStatus,
    /// `ok` or the optimizer's error message.
    pub optimizer_status: String,
    /// Index parameters.
    #[serde(default)]
    pub hnsw: HnswSettings,
    /// Indexed payload fields and their types.
    #[serde(default)]
    pub payload_schema: Map<String, Value>,
}

impl CollectionDescriptor {
    /// Dimensionality of the named dense vector space.
    pub fn dimension(&self, vector_name: &str) -> Option<u64> {
        self.vectors.get(vector_name).map(|v| v.size)
    }
}

/// Parameters for creating a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Dense vector spaces by name.
    pub vectors: BTreeMap<String, VectorSpace>,
    /// Sparse vector space names.
    #[serde(default)]
    pub sparse_vectors: Vec<String>,
    /// Index parameters.
    #[serde(default)]
    pub hnsw: HnswSettings,
}

/// Partial update of collection parameters. `None` leaves a value unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionUpdate {
    /// New HNSW `m`.
    pub hnsw_m: Option<u64>,
    /// New HNSW `ef_construct`.
    pub hnsw_ef_construct: Option<u64>,
    /// Minimum vectors per segment before indexing.
    pub indexing_threshold: Option<u64>,
    /// Seconds between flushes.
    pub flush_interval_sec: Option<u64>,
}

impl CollectionUpdate {
    /// `true` when no parameter would change.
    pub fn is_empty(&self) -> bool {
        self.hnsw_m.is_none()
            && self.hnsw_ef_construct.is_none()
            && self.indexing_threshold.is_none()
            && self.flush_interval_sec.is_none()
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Nearest-neighbour search in one named vector space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Vector space to search.
    pub vector_name: String,
    /// Query vector.
    pub vector: Vec<f64>,
    /// Payload filter.
    #[serde(default)]
    pub filter: Option<FilterExpression>,
    /// Minimum score.
    #[serde(default)]
    pub score_threshold: Option<f64>,
    /// Maximum hits.
    pub limit: u64,
    /// Hits to skip.
    #[serde(default)]
    pub offset: u64,
    /// Return payloads.
    pub with_payload: bool,
    /// Return vectors.
    pub with_vector: bool,
}

/// Recommendation from example points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendQuery {
    /// Points to move towards. Never empty.
    pub positive: Vec<PointId>,
    /// Points to move away from.
    #[serde(default)]
    pub negative: Vec<PointId>,
    /// Vector space to use.
    pub vector_name: String,
    /// Payload filter.
    #[serde(default)]
    pub filter: Option<FilterExpression>,
    /// Minimum score.
    #[serde(default)]
    pub score_threshold: Option<f64>,
    /// Maximum hits.
    pub limit: u64,
    /// Return payloads.
    pub with_payload: bool,
    /// Return vectors.
    pub with_vector: bool,
}

/// Page request over all points in id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollRequest {
    /// Payload filter.
    #[serde(default)]
    pub filter: Option<FilterExpression>,
    /// Page size.
    pub limit: u64,
    /// First id of the page, from a previous page's `next_offset`.
    #[serde(default)]
    pub offset: Option<PointId>,
    /// Return payloads.
    pub with_payload: bool,
    /// Return vectors.
    pub with_vector: bool,
}

/// One page of scrolled points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollPage {
    /// Points on this page.
    pub points: Vec<PointRecord>,
    /// Where the next page starts; `None` on the last page.
    pub next_offset: Option<PointId>,
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// A backend-managed backup of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotDescriptor {
    /// Physical collection name.
    pub collection: String,
    /// Snapshot file name.
    pub name: String,
    /// Creation time as reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    /// Size in bytes.
    pub size: u64,
}

/// Identity of the backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClusterInfo {
    /// Product title.
    pub title: String,
    /// Version string.
    pub version: String,
    /// Build commit, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn point_id_is_untagged() {
        assert_eq!(serde_json::to_value(PointId::Num(7)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(PointId::from("doc-1")).unwrap(), json!("doc-1"));
        let id: PointId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id, PointId::Num(42));
        let id: PointId = serde_json::from_value(json!("x")).unwrap();
        assert_eq!(id, PointId::Str("x".into()));
    }

    #[test]
    fn negative_point_id_is_rejected() {
        assert!(serde_json::from_value::<PointId>(json!(-1)).is_err());
    }

    #[test]
    fn vector_data_dense_and_sparse() {
        let dense: VectorData = serde_json::from_value(json!([0.1, 0.2])).unwrap();
        assert_eq!(dense.dense_len(), Some(2));
        let sparse: VectorData =
            serde_json::from_value(json!({"indices": [1, 5], "values": [0.5, 0.25]})).unwrap();
        assert_eq!(sparse.dense_len(), None);
    }

    #[test]
    fn distance_parses_case_insensitively() {
        assert_eq!("Cosine".parse::<Distance>().unwrap(), Distance::Cosine);
        assert_eq!("DOT".parse::<Distance>().unwrap(), Distance::Dot);
        assert!("hamming".parse::<Distance>().is_err());
        assert_eq!(serde_json::to_value(Distance::Euclid).unwrap(), json!("euclid"));
    }

    #[test]
    fn collection_status_parse() {
        assert_eq!(CollectionStatus::parse("green"), CollectionStatus::Green);
        assert_eq!(CollectionStatus::parse("GREY"), CollectionStatus::Grey);
        assert_eq!(CollectionStatus::parse("purple"), CollectionStatus::Unknown);
    }

    #[test]
    fn collection_update_emptiness() {
        assert!(CollectionUpdate::default().is_empty());
        let update = CollectionUpdate {
            flush_interval_sec: Some(5),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn descriptor_dimension_lookup() {
        let mut vectors = BTreeMap::new();
        vectors.insert(
            "text-dense".to_string(),
            VectorSpace {
                size: 384,
                distance: Distance::Cosine,
                on_disk: false,
            },
        );
        let d = CollectionDescriptor {
            logical_name: "kb".into(),
            physical_name: "kb".into(),
            vectors,
            sparse_vectors: vec![],
            points_count: 0,
            indexed_vectors_count: 0,
            segments_count: 1,
            status: CollectionStatus::Green,
            optimizer_status: "ok".into(),
            hnsw: HnswSettings::default(),
            payload_schema: Map::new(),
        };
        assert_eq!(d.dimension("text-dense"), Some(384));
        assert_eq!(d.dimension("other"), None);
    }
}
