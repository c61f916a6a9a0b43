// SPDX-License-Identifier: MIT OR Apache-2.0
//! Maintenance and introspection tools.

use super::common::{collection_param, flag_param, plural, scope_param, to_json};
use crate::ToolOutput;
use crate::args::Arguments;
use crate::context::CallContext;
use crate::health::probe;
use crate::registry::{ToolHandler, handler};
use crate::schema::ToolDefinition;
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use vtb_config::BridgeConfig;
use vtb_core::{CollectionDescriptor, CollectionStatus};
use vtb_error::BridgeError;
use vtb_namespace::{CollectionName, logical_in_scope};

pub(crate) fn tools(config: &BridgeConfig) -> Vec<(ToolDefinition, ToolHandler)> {
    vec![
        (
            ToolDefinition::new(
                "qdrant_optimize_collection",
                "Trigger segment merging and index rebuild; optionally wait for it",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(flag_param(
                "wait",
                "Poll until the optimizer reports done, up to the configured limit",
                false,
            )),
            handler(optimize_collection),
        ),
        (
            ToolDefinition::new("qdrant_create_snapshot", "Create a backup snapshot of a collection")
                .param(collection_param(config))
                .param(scope_param(config)),
            handler(create_snapshot),
        ),
        (
            ToolDefinition::new("qdrant_list_snapshots", "List snapshots of a collection")
                .param(collection_param(config))
                .param(scope_param(config)),
            handler(list_snapshots),
        ),
        (
            ToolDefinition::new(
                "qdrant_get_cluster_info",
                "Backend version and an overview of the collections in the scope",
            )
            .param(scope_param(config)),
            handler(get_cluster_info),
        ),
        (
            ToolDefinition::new(
                "qdrant_health_check",
                "Probe backend connectivity; reports healthy, degraded or unhealthy with latencies",
            ),
            handler(health_check),
        ),
    ]
}

fn optimized(info: &CollectionDescriptor) -> bool {
    info.optimizer_status == "ok" && info.status == CollectionStatus::Green
}

async fn optimize_collection(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let before = ctx.backend.get_collection(&name).await?;
    ctx.backend.optimize(&name).await?;

    let mut out = Map::new();
    out.insert("collection".into(), json!(name.logical()));
    out.insert("operation".into(), json!("optimize"));
    out.insert("segments_before".into(), json!(before.segments_count));
    out.insert("optimization_triggered".into(), json!(true));

    let mut summary = format!("optimization of `{}` triggered", name.logical());
    if args.flag("wait") {
        let limits = ctx.limits();
        let budget = Duration::from_secs(limits.optimize_wait_secs);
        let poll = Duration::from_secs(limits.optimize_poll_secs.max(1));
        let started = Instant::now();
        loop {
            let info = ctx.backend.get_collection(&name).await?;
            if optimized(&info) {
                out.insert("segments_after".into(), json!(info.segments_count));
                out.insert("optimization_complete".into(), json!(true));
                summary = format!(
                    "optimized `{}`: {} -> {} segments",
                    name.logical(),
                    before.segments_count,
                    info.segments_count
                );
                break;
            }
            if started.elapsed() + poll > budget {
                out.insert("optimization_complete".into(), json!(false));
                out.insert("message".into(), json!("Optimization still in progress"));
                summary = format!("optimization of `{}` still in progress", name.logical());
                break;
            }
            debug!(target: "vtb.dispatch", collection = %name, status = ?info.status, "waiting for optimizer");
            tokio::time::sleep(poll).await;
        }
    }
    Ok(ToolOutput::new(Value::Object(out)).with_summary(summary))
}

async fn create_snapshot(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let info = ctx.backend.get_collection(&name).await?;
    let snapshot = ctx.backend.create_snapshot(&name).await?;
    let created_at = snapshot
        .creation_time
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "snapshot_name": snapshot.name,
        "points_count": info.points_count,
        "size_bytes": snapshot.size,
        "created_at": created_at,
        "status": "completed",
    }))
    .with_summary(format!("snapshot {} created", snapshot.name)))
}

async fn list_snapshots(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let snapshots = ctx.backend.list_snapshots(&name).await?;
    let listed: Vec<Value> = snapshots
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "size_bytes": s.size,
                "creation_time": s.creation_time,
            })
        })
        .collect();
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "snapshots": listed,
        "count": listed.len(),
    }))
    .with_summary(plural(listed.len(), "snapshot", "snapshots")))
}

async fn get_cluster_info(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let scope = ctx.scope(&args).to_string();
    let cluster = ctx.backend.cluster_info().await?;
    let physical = ctx.backend.list_collections().await?;
    let names: Vec<CollectionName> = physical
        .iter()
        .filter_map(|p| logical_in_scope(p, &scope))
        .filter_map(|logical| CollectionName::resolve(logical, &scope).ok())
        .collect();
    let described = join_all(names.iter().map(|n| ctx.backend.get_collection(n))).await;

    let mut total_points = 0u64;
    let collections: Vec<Value> = names
        .iter()
        .zip(described)
        .map(|(name, info)| match info {
            Ok(d) => {
                total_points += d.points_count;
                json!({ "name": name.logical(), "points": d.points_count, "status": d.status })
            }
            Err(_) => json!({ "name": name.logical(), "points": 0, "status": "error" }),
        })
        .collect();

    let summary = format!(
        "{} {}, {}",
        cluster.title,
        cluster.version,
        plural(collections.len(), "collection", "collections")
    );
    Ok(ToolOutput::new(json!({
        "url": ctx.config.backend.url,
        "title": cluster.title,
        "version": cluster.version,
        "commit": cluster.commit,
        "collections_count": collections.len(),
        "total_points": total_points,
        "collections": collections,
    }))
    .with_summary(summary))
}

async fn health_check(ctx: CallContext, _args: Arguments) -> Result<ToolOutput, BridgeError> {
    let backend = &ctx.config.backend;
    let report = probe(ctx.backend.as_ref(), &backend.url, backend.health_timeout()).await;
    let summary = match &report.reason {
        Some(reason) => format!("{}: {reason}", report.status.as_str()),
        None => report.status.as_str().to_string(),
    };
    Ok(ToolOutput::new(to_json(&report)?).with_summary(summary))
}
