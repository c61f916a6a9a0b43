// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Tool registry, dispatcher and the vector store tool catalog.
//!
//! A [`ToolInvocation`] goes through [`Dispatcher::dispatch`] and always comes
//! back as exactly one [`ToolResult`].

pub mod args;
pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod health;
pub mod registry;
pub mod schema;

pub use args::{Arguments, validate};
pub use catalog::{BUILTIN_TOOL_COUNT, builtin_registry};
pub use context::CallContext;
pub use dispatch::Dispatcher;
pub use health::{HealthReport, HealthStatus, probe};
pub use registry::{RegistryBuilder, RegistryError, ToolHandler, ToolRegistry, handler};
pub use schema::{CONFIRM, ItemType, ParamSpec, ParamType, ToolDefinition};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vtb_error::{BridgeError, ErrorPayload};

/// A request to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolInvocation {
    /// Registered tool name.
    pub tool_name: String,
    /// Argument name to JSON value.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Opaque credential forwarded to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_token: Option<String>,
}

impl ToolInvocation {
    /// An invocation without a caller token.
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            caller_token: None,
        }
    }

    /// Attach the caller's token. Empty tokens are ignored.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.caller_token = token.filter(|t| !t.is_empty());
        self
    }
}

/// What a handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Structured result.
    pub payload: Value,
    /// One line for humans.
    pub summary: Option<String>,
}

impl ToolOutput {
    /// Output without a summary.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            summary: None,
        }
    }

    /// Attach a human-readable summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Outcome of one invocation. Exactly one of `payload` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolResult {
    /// Whether the tool succeeded.
    pub success: bool,
    /// Structured result on success, `null` otherwise.
    pub payload: Option<Value>,
    /// Human-readable summary of a success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Typed failure, `null` on success.
    pub error: Option<ErrorPayload>,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(output: ToolOutput) -> Self {
        Self {
            success: true,
            payload: Some(output.payload),
            summary: output.summary,
            error: None,
        }
    }

    /// A failed result. `Internal` errors are sanitised.
    pub fn err(error: &BridgeError) -> Self {
        Self {
            success: false,
            payload: None,
            summary: None,
            error: Some(error.to_payload()),
        }
    }

    /// Split into payload or error.
    pub fn into_result(self) -> Result<Value, ErrorPayload> {
        match (self.payload, self.error) {
            (_, Some(e)) => Err(e),
            (Some(p), None) => Ok(p),
            (None, None) => Ok(Value::Null),
        }
    }
}

impl From<Result<ToolOutput, BridgeError>> for ToolResult {
    fn from(r: Result<ToolOutput, BridgeError>) -> Self {
        match r {
            Ok(out) => Self::ok(out),
            Err(e) => Self::err(&e),
        }
    }
}
