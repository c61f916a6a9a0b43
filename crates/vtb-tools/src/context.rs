// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-invocation context handed to tool handlers.

use crate::args::Arguments;
use std::sync::Arc;
use vtb_backend::VectorBackend;
use vtb_config::{BridgeConfig, DefaultSettings, LimitSettings};
use vtb_error::BridgeError;
use vtb_namespace::CollectionName;

/// Argument carrying the isolation scope.
pub const SCOPE: &str = "scope";

/// Everything a handler may touch.
#[derive(Clone)]
pub struct CallContext {
    /// Backend, already bound to the caller's token.
    pub backend: Arc<dyn VectorBackend>,
    /// Effective configuration.
    pub config: Arc<BridgeConfig>,
    /// Caller credential, if any.
    pub caller_token: Option<String>,
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("authenticated", &self.caller_token.is_some())
            .finish_non_exhaustive()
    }
}

impl CallContext {
    /// Bind `backend` to `caller_token` when one is given.
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        config: Arc<BridgeConfig>,
        caller_token: Option<String>,
    ) -> Self {
        let backend = match caller_token.as_deref() {
            Some(token) if !token.is_empty() => backend.with_token(token),
            _ => backend,
        };
        Self {
            backend,
            config,
            caller_token,
        }
    }

    /// Configured limits.
    pub fn limits(&self) -> &LimitSettings {
        &self.config.limits
    }

    /// Configured defaults.
    pub fn defaults(&self) -> &DefaultSettings {
        &self.config.defaults
    }

    /// Scope argument, or the configured default.
    pub fn scope<'a>(&'a self, args: &'a Arguments) -> &'a str {
        args.str(SCOPE).unwrap_or(&self.config.defaults.scope)
    }

    /// Resolve the collection named by argument `param` in the caller's scope.
    ///
    /// Falls back to the configured default collection when the argument is
    /// absent. Errors name `param` rather than the generic `collection`.
    pub fn collection(&self, args: &Arguments, param: &str) -> Result<CollectionName, BridgeError> {
        let logical = args
            .str(param)
            .unwrap_or(&self.config.defaults.collection);
        CollectionName::resolve(logical, self.scope(args)).map_err(|mut e| {
            if param != "collection" && e.field() == Some("collection") {
                e.message = e.message.replacen("collection", param, 1);
                e = e.with_context("field", param);
            }
            e
        })
    }
}
