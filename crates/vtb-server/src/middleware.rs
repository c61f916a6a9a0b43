// SPDX-License-Identifier: MIT OR Apache-2.0
//! Middleware stack for the bridge's HTTP surface.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, header},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ---------------------------------------------------------------------------
// RequestId middleware
// ---------------------------------------------------------------------------

/// A unique request identifier, available as an Axum extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

/// Tags each request with a [`RequestId`] and echoes it in `x-request-id`.
///
/// A well-formed UUID supplied by the caller in the same header is kept so
/// that proxies can correlate their own logs.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map_or_else(|| RequestId(Uuid::new_v4()), RequestId);
    req.extensions_mut().insert(id);
    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.hyphenated().to_string()) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    resp
}

// ---------------------------------------------------------------------------
// RequestLogger
// ---------------------------------------------------------------------------

/// Logs method, path, status code, and duration for each request.
pub struct RequestLogger;

impl RequestLogger {
    /// Axum-compatible handler function. Runs inside
    /// [`request_id_middleware`], so the id is already attached.
    pub async fn layer(req: Request, next: Next) -> Response {
        let started = Instant::now();
        let method = req.method().clone();
        let route = req.uri().path().to_owned();
        let request_id = req.extensions().get::<RequestId>().map(|id| id.0);

        let resp = next.run(req).await;

        info!(
            target: "vtb.server",
            method = %method,
            path = %route,
            status = resp.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            request_id = ?request_id,
            "request completed"
        );
        resp
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// The token of an `Authorization: Bearer <token>` header, if any.
///
/// The scheme is matched case-insensitively; blank tokens count as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

/// Browser-based MCP clients connect cross-origin.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::HeaderName::from_static(REQUEST_ID_HEADER)])
}
