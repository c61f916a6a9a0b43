// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Backend client adapter.
//!
//! [`VectorBackend`] is the one seam between tool handlers and the vector
//! store. [`QdrantHttpBackend`] implements it against the Qdrant REST API;
//! `vtb-backend-mock` implements it in memory for tests.

pub mod classify;
pub mod pool;
pub mod qdrant;

pub use classify::{classify_status, classify_transport, is_retryable, status_of};
pub use pool::{ConnectionPool, PoolError};
pub use qdrant::QdrantHttpBackend;

use async_trait::async_trait;
use std::sync::Arc;
use vtb_core::{
    ClusterInfo, CollectionDescriptor, CollectionSpec, CollectionUpdate, FilterExpression,
    PointId, PointRecord, PointSelector, RecommendQuery, ScoredPoint, ScrollPage, ScrollRequest,
    SearchQuery, SnapshotDescriptor, WriteAck,
};
use vtb_error::BridgeError;
use vtb_namespace::CollectionName;

/// A vector store the bridge can drive.
///
/// Every method maps to exactly one backend operation. Errors are already
/// classified: implementations never return raw transport errors.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Physical names of every collection.
    async fn list_collections(&self) -> Result<Vec<String>, BridgeError>;

    /// Create a collection. Fails with `BackendRejected` if it already exists.
    async fn create_collection(
        &self,
        name: &CollectionName,
        spec: &CollectionSpec,
    ) -> Result<(), BridgeError>;

    /// Read the current descriptor. Never cached.
    async fn get_collection(&self, name: &CollectionName)
    -> Result<CollectionDescriptor, BridgeError>;

    /// Change index and optimizer parameters.
    async fn update_collection(
        &self,
        name: &CollectionName,
        update: &CollectionUpdate,
    ) -> Result<(), BridgeError>;

    /// Drop a collection and all its points.
    async fn delete_collection(&self, name: &CollectionName) -> Result<(), BridgeError>;

    /// Insert or fully replace points.
    async fn upsert_points(
        &self,
        name: &CollectionName,
        points: &[PointRecord],
        wait: bool,
    ) -> Result<WriteAck, BridgeError>;

    /// Fetch points by id. Missing ids are absent from the result.
    async fn get_points(
        &self,
        name: &CollectionName,
        ids: &[PointId],
        with_payload: bool,
        with_vector: bool,
    ) -> Result<Vec<PointRecord>, BridgeError>;

    /// One page of points in id order.
    async fn scroll_points(
        &self,
        name: &CollectionName,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, BridgeError>;

    /// Number of points matching `filter`.
    async fn count_points(
        &self,
        name: &CollectionName,
        filter: Option<&FilterExpression>,
        exact: bool,
    ) -> Result<u64, BridgeError>;

    /// Delete points by ids or by filter.
    async fn delete_points(
        &self,
        name: &CollectionName,
        selector: &PointSelector,
        wait: bool,
    ) -> Result<WriteAck, BridgeError>;

    /// Nearest neighbours of one query vector.
    async fn search(
        &self,
        name: &CollectionName,
        query: &SearchQuery,
    ) -> Result<Vec<ScoredPoint>, BridgeError>;

    /// Several searches in one round trip; results are in query order.
    async fn search_batch(
        &self,
        name: &CollectionName,
        queries: &[SearchQuery],
    ) -> Result<Vec<Vec<ScoredPoint>>, BridgeError>;

    /// Points similar to `positive` and dissimilar to `negative`.
    async fn recommend(
        &self,
        name: &CollectionName,
        query: &RecommendQuery,
    ) -> Result<Vec<ScoredPoint>, BridgeError>;

    /// Ask the optimizer to index and merge segments now.
    async fn optimize(&self, name: &CollectionName) -> Result<(), BridgeError>;

    /// Take a snapshot of a collection.
    async fn create_snapshot(&self, name: &CollectionName)
    -> Result<SnapshotDescriptor, BridgeError>;

    /// Snapshots of a collection.
    async fn list_snapshots(
        &self,
        name: &CollectionName,
    ) -> Result<Vec<SnapshotDescriptor>, BridgeError>;

    /// Backend identity and version. Also the liveness probe.
    async fn cluster_info(&self) -> Result<ClusterInfo, BridgeError>;

    /// A handle that authenticates with the caller's `token` instead of the
    /// configured key. Shares the connection pool.
    fn with_token(&self, token: &str) -> Arc<dyn VectorBackend>;
}
