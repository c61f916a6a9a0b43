// SPDX-License-Identifier: MIT OR Apache-2.0
//! The immutable tool registry.

use crate::ToolOutput;
use crate::args::Arguments;
use crate::context::CallContext;
use crate::schema::ToolDefinition;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use vtb_error::BridgeError;

/// Future returned by a tool handler.
pub type HandlerFuture = BoxFuture<'static, Result<ToolOutput, BridgeError>>;

/// An async tool implementation.
pub type ToolHandler = Arc<dyn Fn(CallContext, Arguments) -> HandlerFuture + Send + Sync>;

/// Box an async function as a [`ToolHandler`].
pub fn handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(CallContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, BridgeError>> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

/// Why a registry could not be built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two tools share a name.
    #[error("tool `{0}` is registered twice")]
    DuplicateTool(String),
    /// A definition is internally inconsistent.
    #[error("tool `{tool}` is invalid: {reason}")]
    InvalidDefinition {
        /// Offending tool.
        tool: String,
        /// What is wrong.
        reason: String,
    },
}

/// A definition paired with its implementation.
#[derive(Clone)]
pub struct RegisteredTool {
    /// Immutable description.
    pub definition: ToolDefinition,
    /// Implementation.
    pub handler: ToolHandler,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("definition", &self.definition.name)
            .finish_non_exhaustive()
    }
}

/// Collects tools before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tools: Vec<RegisteredTool>,
}

impl RegistryBuilder {
    /// Add a tool.
    pub fn register(mut self, definition: ToolDefinition, handler: ToolHandler) -> Self {
        self.tools.push(RegisteredTool {
            definition,
            handler,
        });
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateTool`] when two tools share a name,
    /// [`RegistryError::InvalidDefinition`] for an empty name or a repeated
    /// parameter.
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut index = BTreeMap::new();
        for (i, tool) in self.tools.iter().enumerate() {
            let def = &tool.definition;
            if def.name.is_empty() {
                return Err(RegistryError::InvalidDefinition {
                    tool: def.name.clone(),
                    reason: "empty name".into(),
                });
            }
            let mut seen = BTreeSet::new();
            if let Some(dup) = def.params.iter().find(|p| !seen.insert(p.name.as_str())) {
                return Err(RegistryError::InvalidDefinition {
                    tool: def.name.clone(),
                    reason: format!("parameter `{}` is declared twice", dup.name),
                });
            }
            if index.insert(def.name.clone(), i).is_some() {
                return Err(RegistryError::DuplicateTool(def.name.clone()));
            }
        }
        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}

/// Tools available to callers. Never mutated after [`RegistryBuilder::build`].
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: BTreeMap<String, usize>,
}

impl ToolRegistry {
    /// Start a new registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| &t.definition)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.definitions().map(|d| d.name.as_str()).collect()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tool is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
