// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collection lifecycle tools.

use super::common::{flag_param, name_param, plural, scope_param, to_json};
use crate::args::Arguments;
use crate::context::CallContext;
use crate::registry::{ToolHandler, handler};
use crate::schema::{ParamSpec, ParamType, ToolDefinition};
use crate::ToolOutput;
use futures::future::join_all;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use vtb_config::BridgeConfig;
use vtb_core::{CollectionSpec, CollectionUpdate, Distance, HnswSettings, VectorSpace};
use vtb_error::BridgeError;
use vtb_namespace::{CollectionName, logical_in_scope};

pub(crate) fn tools(config: &BridgeConfig) -> Vec<(ToolDefinition, ToolHandler)> {
    vec![
        (
            ToolDefinition::new(
                "qdrant_list_collections",
                "List collections in the scope with status, point and segment counts",
            )
            .param(scope_param(config)),
            handler(list_collections),
        ),
        (
            ToolDefinition::new(
                "qdrant_create_collection",
                "Create a collection with a dense vector space and optional sparse vectors",
            )
            .param(name_param("create"))
            .param(scope_param(config))
            .param(
                ParamSpec::new("vector_size", ParamType::Integer)
                    .describe("Dimensionality of the dense vectors")
                    .range(1, 65_536)
                    .default(384),
            )
            .param(
                ParamSpec::new("distance", ParamType::String)
                    .describe("Distance metric")
                    .one_of(&["cosine", "euclid", "dot", "manhattan"])
                    .default("cosine"),
            )
            .param(flag_param("on_disk", "Store vectors on disk", false))
            .param(
                ParamSpec::new("hnsw_m", ParamType::Integer)
                    .describe("HNSW edges per node")
                    .range(4, 128)
                    .default(16),
            )
            .param(
                ParamSpec::new("hnsw_ef_construct", ParamType::Integer)
                    .describe("HNSW neighbours considered while building")
                    .range(4, 512)
                    .default(100),
            )
            .param(flag_param(
                "enable_sparse",
                "Add a sparse vector space for hybrid search",
                false,
            )),
            handler(create_collection),
        ),
        (
            ToolDefinition::new(
                "qdrant_delete_collection",
                "Delete a collection and every point in it",
            )
            .param(name_param("delete"))
            .param(scope_param(config))
            .destructive(),
            handler(delete_collection),
        ),
        (
            ToolDefinition::new(
                "qdrant_get_collection_info",
                "Vector configuration, index settings, counts and optimizer status of a collection",
            )
            .param(name_param("inspect"))
            .param(scope_param(config)),
            handler(get_collection_info),
        ),
        (
            ToolDefinition::new(
                "qdrant_update_collection",
                "Change HNSW or optimizer parameters of a collection",
            )
            .param(name_param("update"))
            .param(scope_param(config))
            .param(ParamSpec::new("hnsw_m", ParamType::Integer).range(4, 128))
            .param(ParamSpec::new("hnsw_ef_construct", ParamType::Integer).range(4, 512))
            .param(
                ParamSpec::new("indexing_threshold", ParamType::Integer)
                    .describe("Minimum vectors per segment before indexing; 0 indexes immediately")
                    .at_least(0),
            )
            .param(
                ParamSpec::new("flush_interval_sec", ParamType::Integer)
                    .describe("Seconds between flushes")
                    .at_least(1),
            ),
            handler(update_collection),
        ),
    ]
}

async fn list_collections(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let scope = ctx.scope(&args).to_string();
    let physical = ctx.backend.list_collections().await?;
    let names: Vec<CollectionName> = physical
        .iter()
        .filter_map(|p| logical_in_scope(p, &scope))
        .filter_map(|logical| CollectionName::resolve(logical, &scope).ok())
        .collect();

    let described = join_all(names.iter().map(|n| ctx.backend.get_collection(n))).await;
    let collections: Vec<Value> = names
        .iter()
        .zip(described)
        .map(|(name, info)| match info {
            Ok(d) => json!({
                "name": name.logical(),
                "status": d.status,
                "points_count": d.points_count,
                "indexed_vectors_count": d.indexed_vectors_count,
                "segments_count": d.segments_count,
            }),
            Err(_) => json!({
                "name": name.logical(),
                "status": "unknown",
                "points_count": 0,
            }),
        })
        .collect();

    let summary = plural(collections.len(), "collection", "collections");
    Ok(ToolOutput::new(json!({
        "collections": collections,
        "total_count": collections.len(),
    }))
    .with_summary(summary))
}

async fn create_collection(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "name")?;
    let size = args.u64("vector_size").unwrap_or(384);
    let distance: Distance = args
        .str("distance")
        .unwrap_or("cosine")
        .parse()
        .map_err(|e: String| BridgeError::invalid_argument("distance", e))?;
    let on_disk = args.flag("on_disk");
    let m = args.u64("hnsw_m").unwrap_or(16);
    let ef_construct = args.u64("hnsw_ef_construct").unwrap_or(100);
    let sparse = args.flag("enable_sparse");

    let defaults = ctx.defaults();
    let spec = CollectionSpec {
        vectors: BTreeMap::from([(
            defaults.vector_name.clone(),
            VectorSpace {
                size,
                distance,
                on_disk,
            },
        )]),
        sparse_vectors: if sparse {
            vec![defaults.sparse_vector_name.clone()]
        } else {
            Vec::new()
        },
        hnsw: HnswSettings {
            m: Some(m),
            ef_construct: Some(ef_construct),
            ..HnswSettings::default()
        },
    };
    ctx.backend.create_collection(&name, &spec).await?;

    Ok(ToolOutput::new(json!({
        "message": format!("Collection '{}' created successfully", name.logical()),
        "config": {
            "name": name.logical(),
            "scope": name.scope(),
            "vector_size": size,
            "distance": distance,
            "on_disk": on_disk,
            "hnsw_m": m,
            "hnsw_ef_construct": ef_construct,
            "sparse_enabled": sparse,
        },
    }))
    .with_summary(format!(
        "created `{}` ({size}d, {distance})",
        name.logical()
    )))
}

async fn delete_collection(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "name")?;
    let points = ctx.backend.get_collection(&name).await?.points_count;
    ctx.backend.delete_collection(&name).await?;
    Ok(ToolOutput::new(json!({
        "message": format!("Collection '{}' deleted successfully", name.logical()),
        "deleted_points": points,
    }))
    .with_summary(format!(
        "deleted `{}` and {}",
        name.logical(),
        plural(points as usize, "point", "points")
    )))
}

async fn get_collection_info(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "name")?;
    let info = ctx.backend.get_collection(&name).await?;
    let summary = format!(
        "`{}`: {}, {}",
        name.logical(),
        info.status.as_str(),
        plural(info.points_count as usize, "point", "points")
    );
    Ok(ToolOutput::new(to_json(&info)?).with_summary(summary))
}

async fn update_collection(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "name")?;
    let update = CollectionUpdate {
        hnsw_m: args.u64("hnsw_m"),
        hnsw_ef_construct: args.u64("hnsw_ef_construct"),
        indexing_threshold: args.u64("indexing_threshold"),
        flush_interval_sec: args.u64("flush_interval_sec"),
    };
    if update.is_empty() {
        return Err(BridgeError::invalid_argument(
            "arguments",
            "give at least one of hnsw_m, hnsw_ef_construct, indexing_threshold, flush_interval_sec",
        ));
    }
    ctx.backend.update_collection(&name, &update).await?;
    Ok(ToolOutput::new(json!({
        "message": format!("Collection '{}' updated successfully", name.logical()),
        "updates": to_json(&update)?,
    }))
    .with_summary(format!("updated `{}`", name.logical())))
}
