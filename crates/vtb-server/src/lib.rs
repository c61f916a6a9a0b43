// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! HTTP surface of the vector tool bridge.
//!
//! MCP clients either hold an SSE stream open on `/sse` and post JSON-RPC
//! messages to the advertised `/messages/?session_id=...` endpoint, or post
//! JSON-RPC directly to `/mcp`. Plain HTTP callers can use `/tools/call`.

/// Request id, logging, credential and CORS middleware.
pub mod middleware;
/// JSON-RPC framing of the MCP methods.
pub mod rpc;
/// SSE session table.
pub mod session;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;
use vtb_backend::VectorBackend;
use vtb_config::BridgeConfig;
use vtb_tools::{Dispatcher, RegistryError, ToolInvocation, ToolResult, builtin_registry, probe};

use crate::middleware::{RequestLogger, bearer_token, cors_layer, request_id_middleware};
use crate::rpc::ServerInfo;
use crate::session::SessionTable;

/// Shared state behind every route.
pub struct AppState {
    /// Runs tool invocations.
    pub dispatcher: Dispatcher,
    /// Effective configuration.
    pub config: Arc<BridgeConfig>,
    /// Open SSE sessions.
    pub sessions: SessionTable,
    /// Identity reported to clients.
    pub info: ServerInfo,
}

impl AppState {
    /// State around an existing dispatcher.
    pub fn new(dispatcher: Dispatcher) -> Self {
        let config = dispatcher.config().clone();
        let info = ServerInfo::current(config.server.name.clone());
        Self {
            dispatcher,
            config,
            sessions: SessionTable::new(),
            info,
        }
    }

    /// State serving the built-in tool catalog against `backend`.
    pub fn with_backend(
        backend: Arc<dyn VectorBackend>,
        config: BridgeConfig,
    ) -> Result<Self, RegistryError> {
        let config = Arc::new(config);
        let registry = Arc::new(builtin_registry(&config)?);
        Ok(Self::new(Dispatcher::new(registry, backend, config)))
    }
}

/// Error body returned by the non-RPC routes.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// Build the Axum router with all bridge routes.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(cmd_root))
        .route("/health", get(cmd_health))
        .route("/sse", get(cmd_sse))
        .route("/messages", post(cmd_messages))
        .route("/messages/", post(cmd_messages))
        .route("/mcp", post(cmd_mcp))
        .route("/tools/call", post(cmd_tools_call))
        .layer(axum::middleware::from_fn(RequestLogger::layer))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors_layer())
        .with_state(state)
}

async fn cmd_root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "name": state.info.name,
        "version": state.info.version,
        "status": "running",
        "time": Utc::now().to_rfc3339(),
        "tools": state.dispatcher.registry().len(),
        "endpoints": {
            "health": "/health",
            "sse": "/sse",
            "messages": "/messages/",
            "mcp": "/mcp",
            "tools_call": "/tools/call",
        },
    }))
}

async fn cmd_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend = &state.config.backend;
    let report = probe(
        state.dispatcher.backend().as_ref(),
        &backend.url,
        backend.health_timeout(),
    )
    .await;
    let status = if report.is_reachable() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn cmd_sse(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let (id, rx, guard) = state.sessions.open(bearer_token(&headers));
    info!(target: "vtb.server", session_id = %id, "session opened");

    let endpoint = SseEvent::default()
        .event("endpoint")
        .data(format!("/messages/?session_id={}", id.simple()));
    // The guard lives as long as the stream; dropping it closes the session.
    let messages = ReceiverStream::new(rx).map(move |message| {
        let _session = &guard;
        Ok(SseEvent::default()
            .event("message")
            .data(message.to_string()))
    });
    let stream = tokio_stream::once(Ok(endpoint)).chain(messages);

    let interval = Duration::from_secs(state.config.server.sse_keepalive_secs.max(1));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(interval))
}

/// Query string of the session message endpoint.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    /// Id from the `endpoint` event.
    pub session_id: Uuid,
}

async fn cmd_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let id = query.session_id;
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("unknown session: {id}")))?;
    let token = bearer_token(&headers).or_else(|| session.token.clone());

    let task_state = state.clone();
    tokio::spawn(async move {
        let reply =
            rpc::handle_payload(&task_state.dispatcher, &task_state.info, &body, token).await;
        let Some(reply) = reply else {
            return;
        };
        if session.tx.send(reply).await.is_err() {
            warn!(
                target: "vtb.server",
                session_id = %id,
                "session closed before the reply was delivered; reply discarded"
            );
            task_state.sessions.remove(&id);
        }
    });
    Ok(StatusCode::ACCEPTED)
}

async fn cmd_mcp(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let token = bearer_token(&headers);
    let task_state = state.clone();
    let reply = run_detached("/mcp", async move {
        rpc::handle_payload(&task_state.dispatcher, &task_state.info, &body, token).await
    })
    .await;
    match reply {
        Ok(Some(reply)) => Json(reply).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn cmd_tools_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut invocation): Json<ToolInvocation>,
) -> Result<Json<ToolResult>, ApiError> {
    let token = bearer_token(&headers).or_else(|| invocation.caller_token.take());
    let invocation = invocation.with_token(token);
    let task_state = state.clone();
    let result = run_detached("/tools/call", async move {
        task_state.dispatcher.dispatch(invocation).await
    })
    .await?;
    Ok(Json(result))
}

/// Run a call on its own task so that a caller hanging up cannot cancel a
/// backend write halfway. The result of an abandoned call is dropped.
async fn run_detached<T, F>(route: &'static str, call: F) -> Result<T, ApiError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let out = call.await;
        if tx.send(out).is_err() {
            warn!(
                target: "vtb.server",
                route,
                "caller disconnected before the reply was ready; reply discarded"
            );
        }
    });
    rx.await.map_err(|_| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "call task ended without a reply")
    })
}
