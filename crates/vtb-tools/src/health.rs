// SPDX-License-Identifier: MIT OR Apache-2.0
//! Backend health probing shared by `qdrant_health_check` and `GET /health`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;
use vtb_backend::VectorBackend;
use vtb_error::BridgeError;

/// Rolled-up backend health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Both probes answered.
    Healthy,
    /// Exactly one probe answered.
    Degraded,
    /// Neither probe answered.
    Unhealthy,
}

impl HealthStatus {
    /// Lower-case name, as serialised.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    fn from_probes(http_ok: bool, api_ok: bool) -> Self {
        match (http_ok, api_ok) {
            (true, true) => Self::Healthy,
            (false, false) => Self::Unhealthy,
            _ => Self::Degraded,
        }
    }
}

/// Outcome of one health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HealthReport {
    /// Rolled-up status.
    pub status: HealthStatus,
    /// Backend base URL.
    pub url: String,
    /// Whether the cluster-info round trip succeeded.
    pub http_ok: bool,
    /// Cluster-info latency.
    pub http_latency_ms: Option<u64>,
    /// Whether listing collections succeeded.
    pub api_ok: bool,
    /// Collection listing latency.
    pub api_latency_ms: Option<u64>,
    /// Backend version, when the cluster-info probe answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// First failure observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the probe ran.
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Whether the backend answered the cluster-info probe.
    pub fn is_reachable(&self) -> bool {
        self.http_ok
    }
}

async fn timed<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, BridgeError>>,
) -> (Result<T, String>, u64) {
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("no answer within {}ms", timeout.as_millis())),
    };
    (result, started.elapsed().as_millis() as u64)
}

/// Probe `backend` with a cluster-info and a collection-listing round trip,
/// each bounded by `timeout`.
pub async fn probe(backend: &dyn VectorBackend, url: &str, timeout: Duration) -> HealthReport {
    let (info, http_ms) = timed(timeout, backend.cluster_info()).await;
    let (listing, api_ms) = timed(timeout, backend.list_collections()).await;

    let http_ok = info.is_ok();
    let api_ok = listing.is_ok();
    let reason = info.as_ref().err().or(listing.as_ref().err()).cloned();
    let status = HealthStatus::from_probes(http_ok, api_ok);
    debug!(target: "vtb.backend", ?status, http_ms, api_ms, "health probe");

    HealthReport {
        status,
        url: url.to_string(),
        http_ok,
        http_latency_ms: http_ok.then_some(http_ms),
        api_ok,
        api_latency_ms: api_ok.then_some(api_ms),
        version: info.ok().map(|i| i.version),
        reason,
        timestamp: Utc::now(),
    }
}
