// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON-RPC 2.0 framing of the MCP methods the bridge answers.
//!
//! [`handle_payload`] takes one raw message (a single request or a batch) and
//! produces the response to send back, or `None` when the message consisted
//! only of notifications.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;
use vtb_tools::{Dispatcher, ToolInvocation, ToolResult};

/// Protocol revision offered when the client asks for one we do not know.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol revisions echoed back verbatim during `initialize`.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Standard JSON-RPC error codes.
pub mod codes {
    /// The payload is not JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// The payload is JSON but not a request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// No such method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Method parameters are malformed.
    pub const INVALID_PARAMS: i64 = -32602;
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Identity reported in `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl ServerInfo {
    /// This build, under `name`.
    pub fn current(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A successful response envelope.
pub fn success(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// An error response envelope.
pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() },
    })
}

/// Handle one raw message body.
pub async fn handle_payload(
    dispatcher: &Dispatcher,
    info: &ServerInfo,
    raw: &str,
    token: Option<String>,
) -> Option<Value> {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            return Some(failure(
                Value::Null,
                codes::PARSE_ERROR,
                format!("parse error: {e}"),
            ));
        }
    };
    handle_value(dispatcher, info, parsed, token).await
}

/// Handle an already-parsed message, which may be a batch.
pub async fn handle_value(
    dispatcher: &Dispatcher,
    info: &ServerInfo,
    message: Value,
    token: Option<String>,
) -> Option<Value> {
    match message {
        Value::Array(items) if items.is_empty() => Some(failure(
            Value::Null,
            codes::INVALID_REQUEST,
            "empty batch",
        )),
        Value::Array(items) => {
            let mut replies = Vec::new();
            for item in items {
                if let Some(reply) = handle_single(dispatcher, info, item, token.clone()).await {
                    replies.push(reply);
                }
            }
            (!replies.is_empty()).then_some(Value::Array(replies))
        }
        other => handle_single(dispatcher, info, other, token).await,
    }
}

async fn handle_single(
    dispatcher: &Dispatcher,
    info: &ServerInfo,
    message: Value,
    token: Option<String>,
) -> Option<Value> {
    let fallback_id = message.get("id").cloned().unwrap_or(Value::Null);
    let request: RpcRequest = match serde_json::from_value(message) {
        Ok(r) => r,
        Err(e) => {
            return Some(failure(
                fallback_id,
                codes::INVALID_REQUEST,
                format!("invalid request: {e}"),
            ));
        }
    };
    if request.jsonrpc != "2.0" {
        return Some(failure(
            fallback_id,
            codes::INVALID_REQUEST,
            "jsonrpc must be \"2.0\"",
        ));
    }

    let Some(id) = request.id else {
        debug!(target: "vtb.server", method = %request.method, "notification");
        return None;
    };

    let reply = match request.method.as_str() {
        "initialize" => success(id, initialize(info, request.params.as_ref())),
        "ping" => success(id, json!({})),
        "tools/list" => success(id, list_tools(dispatcher)),
        "tools/call" => match call_params(request.params) {
            Ok((name, arguments)) => {
                let invocation = ToolInvocation::new(name, arguments).with_token(token);
                let result = dispatcher.dispatch(invocation).await;
                success(id, call_tool_result(&result))
            }
            Err(message) => failure(id, codes::INVALID_PARAMS, message),
        },
        other => failure(
            id,
            codes::METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ),
    };
    Some(reply)
}

fn initialize(info: &ServerInfo, params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);
    let version = match requested {
        Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v,
        _ => PROTOCOL_VERSION,
    };
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": info.name, "version": info.version },
    })
}

fn list_tools(dispatcher: &Dispatcher) -> Value {
    let tools: Vec<Value> = dispatcher
        .registry()
        .definitions()
        .map(|def| def.to_mcp())
        .collect();
    json!({ "tools": tools })
}

fn call_params(params: Option<Value>) -> Result<(String, Map<String, Value>), String> {
    let params = params.ok_or("tools/call requires params")?;
    let parsed: CallParams =
        serde_json::from_value(params).map_err(|e| format!("invalid tools/call params: {e}"))?;
    let arguments = match parsed.arguments {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err("tools/call arguments must be an object".into()),
    };
    Ok((parsed.name, arguments))
}

/// Render a [`ToolResult`] as an MCP `CallToolResult`.
///
/// Tool failures are reported in-band with `isError: true`; they are never
/// JSON-RPC errors.
pub fn call_tool_result(result: &ToolResult) -> Value {
    let body = if result.success {
        result.payload.clone().unwrap_or(Value::Null)
    } else {
        serde_json::to_value(&result.error).unwrap_or(Value::Null)
    };
    let text = serde_json::to_string_pretty(&body).unwrap_or_default();
    let mut content = Vec::new();
    if let Some(summary) = &result.summary {
        content.push(json!({ "type": "text", "text": summary }));
    }
    content.push(json!({ "type": "text", "text": text }));

    let mut out = json!({ "content": content, "isError": !result.success });
    if result.success && body.is_object() {
        out["structuredContent"] = body;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vtb_backend_mock::MockBackend;
    use vtb_config::BridgeConfig;
    use vtb_tools::builtin_registry;

    fn dispatcher() -> Dispatcher {
        let config = Arc::new(BridgeConfig::default());
        let registry = Arc::new(builtin_registry(&config).unwrap());
        Dispatcher::new(registry, Arc::new(MockBackend::new()), config)
    }

    fn info() -> ServerInfo {
        ServerInfo::current("test-bridge")
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let reply = handle_payload(&dispatcher(), &info(), "{not json", None)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(codes::PARSE_ERROR));
        assert_eq!(reply["id"], Value::Null);
    }

    #[tokio::test]
    async fn wrong_version_is_invalid_request() {
        let msg = r#"{"jsonrpc":"1.0","id":3,"method":"ping"}"#;
        let reply = handle_payload(&dispatcher(), &info(), msg, None)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(codes::INVALID_REQUEST));
        assert_eq!(reply["id"], json!(3));
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let msg = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(handle_payload(&dispatcher(), &info(), msg, None).await.is_none());
    }

    #[tokio::test]
    async fn initialize_echoes_known_versions_only() {
        let d = dispatcher();
        let known = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#;
        let reply = handle_payload(&d, &info(), known, None).await.unwrap();
        assert_eq!(reply["result"]["protocolVersion"], json!("2025-03-26"));
        assert_eq!(reply["result"]["serverInfo"]["name"], json!("test-bridge"));

        let unknown = r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#;
        let reply = handle_payload(&d, &info(), unknown, None).await.unwrap();
        assert_eq!(reply["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let msg = r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#;
        let reply = handle_payload(&dispatcher(), &info(), msg, None)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(codes::METHOD_NOT_FOUND));
        assert_eq!(reply["id"], json!("a"));
    }

    #[tokio::test]
    async fn tools_list_advertises_every_tool() {
        let msg = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let reply = handle_payload(&dispatcher(), &info(), msg, None)
            .await
            .unwrap();
        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), vtb_tools::BUILTIN_TOOL_COUNT);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == json!("object")));
    }

    #[tokio::test]
    async fn tool_failures_stay_in_band() {
        let msg = r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"nope"}}"#;
        let reply = handle_payload(&dispatcher(), &info(), msg, None)
            .await
            .unwrap();
        assert!(reply.get("error").is_none());
        assert_eq!(reply["result"]["isError"], json!(true));
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("UnknownTool"), "{text}");
    }

    #[tokio::test]
    async fn non_object_arguments_are_invalid_params() {
        let msg = r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"qdrant_health_check","arguments":[1]}}"#;
        let reply = handle_payload(&dispatcher(), &info(), msg, None)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(codes::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn batch_drops_notifications() {
        let msg = r#"[
            {"jsonrpc":"2.0","method":"notifications/initialized"},
            {"jsonrpc":"2.0","id":1,"method":"ping"},
            {"jsonrpc":"2.0","id":2,"method":"ping"}
        ]"#;
        let reply = handle_payload(&dispatcher(), &info(), msg, None)
            .await
            .unwrap();
        assert_eq!(reply.as_array().unwrap().len(), 2);

        let only_notes = r#"[{"jsonrpc":"2.0","method":"notifications/initialized"}]"#;
        assert!(handle_payload(&dispatcher(), &info(), only_notes, None).await.is_none());
    }

    #[test]
    fn success_carries_structured_content() {
        let result = ToolResult::ok(
            vtb_tools::ToolOutput::new(json!({"count": 2})).with_summary("2 points"),
        );
        let out = call_tool_result(&result);
        assert_eq!(out["isError"], json!(false));
        assert_eq!(out["content"][0]["text"], json!("2 points"));
        assert_eq!(out["structuredContent"]["count"], json!(2));
    }
}
