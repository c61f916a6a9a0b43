// SPDX-License-Identifier: MIT OR Apache-2.0
//! The built-in vector store tools.
//!
//! | Group | Tools |
//! |-------|-------|
//! | collections | `qdrant_list_collections`, `qdrant_create_collection`, `qdrant_delete_collection`, `qdrant_get_collection_info`, `qdrant_update_collection` |
//! | points | `qdrant_count_points`, `qdrant_get_points`, `qdrant_scroll_points`, `qdrant_upsert_points`, `qdrant_delete_points` |
//! | search | `qdrant_search_vectors`, `qdrant_search_batch`, `qdrant_recommend_points` |
//! | admin | `qdrant_optimize_collection`, `qdrant_create_snapshot`, `qdrant_list_snapshots`, `qdrant_get_cluster_info`, `qdrant_health_check` |
//!
//! Parameter bounds come from [`vtb_config::LimitSettings`], defaults from
//! [`vtb_config::DefaultSettings`].

mod admin;
mod collections;
mod common;
mod points;
mod search;

use crate::registry::{RegistryError, ToolRegistry};
use vtb_config::BridgeConfig;

/// Number of tools in [`builtin_registry`].
pub const BUILTIN_TOOL_COUNT: usize = 18;

/// Registry holding every built-in tool, in catalog order.
///
/// # Errors
///
/// Only if a definition is malformed, which would be a bug in this crate.
pub fn builtin_registry(config: &BridgeConfig) -> Result<ToolRegistry, RegistryError> {
    collections::tools(config)
        .into_iter()
        .chain(points::tools(config))
        .chain(search::tools(config))
        .chain(admin::tools(config))
        .fold(ToolRegistry::builder(), |b, (def, handler)| b.register(def, handler))
        .build()
}
