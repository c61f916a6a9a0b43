// SPDX-License-Identifier: MIT OR Apache-2.0
//! The invocation pipeline: lookup, validation, confirmation, execution.

use crate::args::validate;
use crate::context::CallContext;
use crate::registry::ToolRegistry;
use crate::schema::{CONFIRM, ToolDefinition};
use crate::{ToolInvocation, ToolOutput, ToolResult};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use vtb_backend::VectorBackend;
use vtb_config::BridgeConfig;
use vtb_error::{BridgeError, ErrorKind};

/// Routes invocations to registered tools.
///
/// Every call to [`Dispatcher::dispatch`] yields exactly one [`ToolResult`];
/// handler errors and panics are converted, never propagated.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    backend: Arc<dyn VectorBackend>,
    config: Arc<BridgeConfig>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// A dispatcher over `registry`, calling `backend`.
    pub fn new(
        registry: Arc<ToolRegistry>,
        backend: Arc<dyn VectorBackend>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
        }
    }

    /// The registry being served.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The shared backend, not bound to any caller.
    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Effective configuration.
    pub fn config(&self) -> &Arc<BridgeConfig> {
        &self.config
    }

    /// Run one invocation to completion.
    pub async fn dispatch(&self, invocation: ToolInvocation) -> ToolResult {
        let started = Instant::now();
        let tool = invocation.tool_name.clone();
        let outcome = self.run(invocation).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => info!(target: "vtb.dispatch", tool = %tool, elapsed_ms, "tool succeeded"),
            Err(e) if e.kind == ErrorKind::Internal => {
                error!(target: "vtb.dispatch", tool = %tool, elapsed_ms, error = ?e, "tool failed")
            }
            Err(e) => {
                warn!(target: "vtb.dispatch", tool = %tool, elapsed_ms, kind = %e.kind, error = %e, "tool failed")
            }
        }
        ToolResult::from(outcome)
    }

    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput, BridgeError> {
        let ToolInvocation {
            tool_name,
            arguments,
            caller_token,
        } = invocation;

        let tool = self
            .registry
            .get(&tool_name)
            .ok_or_else(|| BridgeError::unknown_tool(&tool_name))?;
        let args = validate(&tool.definition, arguments)?;
        check_confirmation(&tool.definition, args.flag(CONFIRM))?;

        debug!(target: "vtb.dispatch", tool = %tool_name, "arguments accepted");
        let ctx = CallContext::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.config),
            caller_token.filter(|t| !t.is_empty()),
        );
        let fut = (tool.handler)(ctx, args);
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".into());
                Err(BridgeError::internal(format!("tool `{tool_name}` panicked: {reason}"))
                    .with_context("tool", &tool_name))
            }
        }
    }
}

fn check_confirmation(def: &ToolDefinition, confirmed: bool) -> Result<(), BridgeError> {
    if def.destructive && !confirmed {
        return Err(BridgeError::invalid_argument(
            CONFIRM,
            format_args!("`{}` permanently deletes data; pass confirm=true", def.name),
        ));
    }
    Ok(())
}
