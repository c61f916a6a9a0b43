// SPDX-License-Identifier: MIT OR Apache-2.0
//! The single place where backend failures become [`BridgeError`]s.
//!
//! | Failure                               | Kind                 |
//! |---------------------------------------|----------------------|
//! | connect error, timeout, broken stream | `BackendUnavailable` |
//! | HTTP 5xx, HTTP 429                    | `BackendUnavailable` |
//! | any other non-2xx                     | `BackendRejected`    |
//! | 2xx with an undecodable body          | `Internal`           |
//!
//! The backend's own message goes to `detail`; the status code goes to the
//! `status` context key.

use reqwest::StatusCode;
use serde_json::Value;
use vtb_error::{BridgeError, ErrorKind};

const MAX_DETAIL_CHARS: usize = 512;

/// Classify a non-2xx response of `operation`.
pub fn classify_status(operation: &str, status: StatusCode, body: &str) -> BridgeError {
    let transient = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
    let (kind, verb) = if transient {
        (ErrorKind::BackendUnavailable, "unavailable")
    } else {
        (ErrorKind::BackendRejected, "rejected")
    };
    let mut err = BridgeError::new(kind, format!("backend {verb} `{operation}`: HTTP {status}"))
        .with_context("operation", operation)
        .with_context("status", status.as_u16());
    if let Some(detail) = backend_message(body) {
        err = err.with_detail(detail);
    }
    err
}

/// Classify a transport failure of `operation`.
pub fn classify_transport(operation: &str, err: reqwest::Error) -> BridgeError {
    let message = if err.is_decode() {
        return BridgeError::internal(format!("undecodable backend response for `{operation}`"))
            .with_context("operation", operation)
            .with_source(err);
    } else if err.is_timeout() {
        format!("backend timed out on `{operation}`")
    } else if err.is_connect() {
        format!("backend unreachable for `{operation}`")
    } else {
        format!("backend transport failed on `{operation}`")
    };
    BridgeError::new(ErrorKind::BackendUnavailable, message)
        .with_context("operation", operation)
        .with_source(err)
}

/// Whether a failed read may be attempted again.
pub fn is_retryable(err: &BridgeError) -> bool {
    err.kind.is_transient()
}

/// The HTTP status recorded by [`classify_status`], if any.
pub fn status_of(err: &BridgeError) -> Option<u16> {
    err.context
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
}

/// Qdrant reports failures as `{"status": {"error": "..."}}`; fall back to
/// the raw body.
fn backend_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<Value>(body)
        && let Some(msg) = v
            .pointer("/status/error")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
    {
        return Some(truncate(msg));
    }
    Some(truncate(body))
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_transient() {
        for code in [500u16, 502, 503, 504, 429] {
            let err = classify_status("search", StatusCode::from_u16(code).unwrap(), "");
            assert_eq!(err.kind, ErrorKind::BackendUnavailable, "{code}");
            assert!(is_retryable(&err));
            assert_eq!(status_of(&err), Some(code));
        }
    }

    #[test]
    fn client_errors_are_rejections_with_backend_message() {
        let body = r#"{"status":{"error":"Not found: Collection `kb` doesn't exist!"},"time":0.0}"#;
        let err = classify_status("get_collection", StatusCode::NOT_FOUND, body);
        assert_eq!(err.kind, ErrorKind::BackendRejected);
        assert!(!is_retryable(&err));
        assert_eq!(
            err.detail.as_deref(),
            Some("Not found: Collection `kb` doesn't exist!")
        );
        assert!(err.message.contains("get_collection"));
    }

    #[test]
    fn plain_text_body_is_kept_and_truncated() {
        let err = classify_status("upsert_points", StatusCode::BAD_REQUEST, "bad things");
        assert_eq!(err.detail.as_deref(), Some("bad things"));

        let long = "x".repeat(2_000);
        let err = classify_status("upsert_points", StatusCode::BAD_REQUEST, &long);
        assert_eq!(err.detail.unwrap().chars().count(), MAX_DETAIL_CHARS + 1);
    }

    #[test]
    fn empty_body_has_no_detail() {
        let err = classify_status("x", StatusCode::CONFLICT, "   ");
        assert!(err.detail.is_none());
    }
}
