// SPDX-License-Identifier: MIT OR Apache-2.0
//! Point tools: count, fetch, scroll, upsert and delete.

use super::common::{
    collection_param, dense_vector, filter_param, flag_param, plural, point_json, scope_param,
};
use crate::ToolOutput;
use crate::args::Arguments;
use crate::context::CallContext;
use crate::registry::{ToolHandler, handler};
use crate::schema::{ItemType, ParamSpec, ParamType, ToolDefinition};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use vtb_config::BridgeConfig;
use vtb_core::{
    CollectionDescriptor, NamedVectors, PointId, PointRecord, PointSelector, ScrollRequest,
    SparseVector, VectorData,
};
use vtb_error::BridgeError;
use vtb_translate::{CursorPosition, CursorScope, UNNAMED_VECTOR, decode_cursor, encode_cursor};

/// Fingerprint tag of scroll cursors.
const SCROLL_CURSOR: &str = "scroll";

pub(crate) fn tools(config: &BridgeConfig) -> Vec<(ToolDefinition, ToolHandler)> {
    let limits = &config.limits;
    let scroll_default = limits.max_scroll_limit.min(100);
    vec![
        (
            ToolDefinition::new(
                "qdrant_count_points",
                "Count points in a collection, optionally matching a filter",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(filter_param())
            .param(flag_param(
                "exact",
                "Exact count (slower) instead of an estimate",
                false,
            )),
            handler(count_points),
        ),
        (
            ToolDefinition::new(
                "qdrant_get_points",
                "Fetch points by id; ids that do not exist are left out",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(ids_param(limits.max_ids as usize).required())
            .param(flag_param("with_payload", "Include payloads", true))
            .param(flag_param("with_vector", "Include vectors", false)),
            handler(get_points),
        ),
        (
            ToolDefinition::new(
                "qdrant_scroll_points",
                "Page through points in id order; pass next_cursor back as cursor",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(
                ParamSpec::new("limit", ParamType::Integer)
                    .describe("Points per page")
                    .range(1, limits.max_scroll_limit as f64)
                    .default(scroll_default),
            )
            .param(
                ParamSpec::new("cursor", ParamType::String)
                    .describe("next_cursor from the previous page, with the same filter"),
            )
            .param(filter_param())
            .param(flag_param("with_payload", "Include payloads", true))
            .param(flag_param("with_vector", "Include vectors", false)),
            handler(scroll_points),
        ),
        (
            ToolDefinition::new(
                "qdrant_upsert_points",
                "Insert or replace points. Each point: {id, vector: [..] or {name: [..]}, payload}",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(
                ParamSpec::new("points", ParamType::Array(ItemType::Object))
                    .describe("Points to write")
                    .items(1, Some(limits.max_upsert_points as usize))
                    .required(),
            )
            .param(flag_param("wait", "Wait until the write is applied", true)),
            handler(upsert_points),
        ),
        (
            ToolDefinition::new(
                "qdrant_delete_points",
                "Delete points by id or by filter; give exactly one of them",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(ids_param(limits.max_ids as usize))
            .param(filter_param())
            .param(flag_param("wait", "Wait until the delete is applied", true))
            .destructive(),
            handler(delete_points),
        ),
    ]
}

fn ids_param(max: usize) -> ParamSpec {
    ParamSpec::new("ids", ParamType::Array(ItemType::PointId))
        .describe("Point ids: unsigned integers or strings")
        .items(1, Some(max))
}

async fn count_points(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let filter = args.filter("filter")?;
    let exact = args.flag("exact");
    let count = ctx
        .backend
        .count_points(&name, filter.as_ref(), exact)
        .await?;
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "count": count,
        "exact": exact,
    }))
    .with_summary(plural(count as usize, "point", "points")))
}

async fn get_points(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let ids = args.point_ids("ids")?;
    let with_payload = args.flag("with_payload");
    let with_vector = args.flag("with_vector");
    let found = ctx
        .backend
        .get_points(&name, &ids, with_payload, with_vector)
        .await?;
    let points: Vec<Value> = found
        .iter()
        .map(|p| point_json(p, with_payload, with_vector))
        .collect();
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "points": points,
        "found_count": points.len(),
        "requested_count": ids.len(),
    }))
    .with_summary(format!("found {} of {}", points.len(), ids.len())))
}

async fn scroll_points(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let filter = args.filter("filter")?;
    let scope = CursorScope {
        collection: name.physical(),
        filter: filter.as_ref(),
        query: SCROLL_CURSOR,
    };
    let offset = match args.str("cursor") {
        None => None,
        Some(token) => match decode_cursor(token, &scope)? {
            CursorPosition::Point(id) => Some(id),
            CursorPosition::Skip(_) => {
                return Err(BridgeError::invalid_argument("cursor", "malformed cursor"));
            }
        },
    };
    let request = ScrollRequest {
        filter: filter.clone(),
        limit: args.u64("limit").unwrap_or(100),
        offset,
        with_payload: args.flag("with_payload"),
        with_vector: args.flag("with_vector"),
    };
    let page = ctx.backend.scroll_points(&name, &request).await?;
    let points: Vec<Value> = page
        .points
        .iter()
        .map(|p| point_json(p, request.with_payload, request.with_vector))
        .collect();
    let next_cursor = page
        .next_offset
        .map(|id| encode_cursor(&scope, &CursorPosition::Point(id)));
    let summary = format!(
        "{}{}",
        plural(points.len(), "point", "points"),
        if next_cursor.is_some() { ", more available" } else { "" }
    );
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "points": points,
        "count": points.len(),
        "has_more": next_cursor.is_some(),
        "next_cursor": next_cursor,
    }))
    .with_summary(summary))
}

#[derive(Deserialize)]
struct RawPoint {
    id: PointId,
    vector: Value,
    #[serde(default)]
    payload: Map<String, Value>,
}

/// Name a bare-list vector is stored under in `info`.
fn default_vector_name<'a>(info: &'a CollectionDescriptor, configured: &'a str) -> &'a str {
    if info.vectors.len() == 1 && info.vectors.contains_key(UNNAMED_VECTOR) {
        UNNAMED_VECTOR
    } else {
        configured
    }
}

#[derive(Debug)]
enum DraftVectors {
    /// A bare list, stored under the collection's default vector.
    Plain(Vec<f64>),
    Named(NamedVectors),
}

/// A point whose shape is valid but not yet checked against a collection.
#[derive(Debug)]
struct DraftPoint {
    index: usize,
    id: PointId,
    vectors: DraftVectors,
    payload: Map<String, Value>,
}

fn invalid_point(index: usize, reason: impl std::fmt::Display) -> BridgeError {
    BridgeError::invalid_argument("points", format_args!("point {index}: {reason}"))
}

/// Shape checks that need no backend round trip.
fn parse_point(index: usize, raw: &Value) -> Result<DraftPoint, BridgeError> {
    let invalid = |reason: String| invalid_point(index, reason);
    let raw = RawPoint::deserialize(raw).map_err(|e| invalid(e.to_string()))?;

    let vectors = match &raw.vector {
        Value::Array(_) => DraftVectors::Plain(dense_vector(&raw.vector).map_err(invalid)?),
        Value::Object(named) => {
            let mut vectors = NamedVectors::new();
            for (vname, v) in named {
                let data = match v {
                    Value::Object(_) => {
                        let s = SparseVector::deserialize(v)
                            .map_err(|e| invalid(format!("sparse vector `{vname}`: {e}")))?;
                        if s.indices.len() != s.values.len() {
                            return Err(invalid(format!(
                                "sparse vector `{vname}` has {} indices but {} values",
                                s.indices.len(),
                                s.values.len()
                            )));
                        }
                        VectorData::Sparse(s)
                    }
                    _ => VectorData::Dense(
                        dense_vector(v).map_err(|e| invalid(format!("vector `{vname}`: {e}")))?,
                    ),
                };
                vectors.insert(vname.clone(), data);
            }
            if vectors.is_empty() {
                return Err(invalid("no vectors given".into()));
            }
            DraftVectors::Named(vectors)
        }
        _ => return Err(invalid("vector must be a list or a map of named vectors".into())),
    };

    Ok(DraftPoint {
        index,
        id: raw.id,
        vectors,
        payload: raw.payload,
    })
}

impl DraftPoint {
    /// Match vector names and dimensions against the live collection.
    fn bind(
        self,
        info: &CollectionDescriptor,
        default_vector: &str,
    ) -> Result<PointRecord, BridgeError> {
        let index = self.index;
        let vectors = match self.vectors {
            DraftVectors::Plain(v) => {
                NamedVectors::from([(default_vector.to_string(), VectorData::Dense(v))])
            }
            DraftVectors::Named(named) => named,
        };
        for (vname, data) in &vectors {
            match data {
                VectorData::Dense(v) => match info.dimension(vname) {
                    Some(expected) if expected != v.len() as u64 => {
                        return Err(invalid_point(
                            index,
                            format_args!(
                                "vector `{vname}` has {} dimensions, collection `{}` expects {expected}",
                                v.len(),
                                info.logical_name
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        return Err(invalid_point(
                            index,
                            format_args!(
                                "collection `{}` has no dense vector `{vname}`",
                                info.logical_name
                            ),
                        ));
                    }
                },
                VectorData::Sparse(_) if !info.sparse_vectors.contains(vname) => {
                    return Err(invalid_point(
                        index,
                        format_args!(
                            "collection `{}` has no sparse vector `{vname}`",
                            info.logical_name
                        ),
                    ));
                }
                VectorData::Sparse(_) => {}
            }
        }
        Ok(PointRecord {
            id: self.id,
            vectors,
            payload: self.payload,
        })
    }
}

async fn upsert_points(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let drafts = args
        .array("points")
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_point(i, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let info = ctx.backend.get_collection(&name).await?;
    let default_vector = default_vector_name(&info, &ctx.defaults().vector_name);
    let points = drafts
        .into_iter()
        .map(|d| d.bind(&info, default_vector))
        .collect::<Result<Vec<_>, _>>()?;

    let ack = ctx
        .backend
        .upsert_points(&name, &points, args.flag("wait"))
        .await?;
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "upserted_count": points.len(),
        "operation": "upsert",
        "status": ack.status,
    }))
    .with_summary(format!(
        "upserted {} into `{}`",
        plural(points.len(), "point", "points"),
        name.logical()
    )))
}

async fn delete_points(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let ids = args.point_ids("ids")?;
    let filter = args.filter("filter")?;
    let (selector, deleted_by, ids_count) = match (ids.is_empty(), filter) {
        (false, None) => {
            let n = ids.len();
            (PointSelector::Ids(ids), "ids", Some(n))
        }
        (true, Some(f)) => (PointSelector::Filter(f), "filter", None),
        _ => {
            return Err(BridgeError::invalid_argument(
                "ids",
                "give exactly one of `ids` and `filter`",
            ));
        }
    };
    let ack = ctx
        .backend
        .delete_points(&name, &selector, args.flag("wait"))
        .await?;
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "operation": "delete",
        "deleted_by": deleted_by,
        "ids_count": ids_count,
        "status": ack.status,
    }))
    .with_summary(format!("deleted points from `{}` by {deleted_by}", name.logical())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vtb_core::{CollectionStatus, Distance, HnswSettings, VectorSpace};

    fn info(vectors: &[(&str, u64)], sparse: &[&str]) -> CollectionDescriptor {
        CollectionDescriptor {
            logical_name: "kb".into(),
            physical_name: "kb".into(),
            vectors: vectors
                .iter()
                .map(|(n, size)| {
                    (
                        n.to_string(),
                        VectorSpace {
                            size: *size,
                            distance: Distance::Cosine,
                            on_disk: false,
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
            sparse_vectors: sparse.iter().map(|s| s.to_string()).collect(),
            points_count: 0,
            indexed_vectors_count: 0,
            segments_count: 1,
            status: CollectionStatus::Green,
            optimizer_status: "ok".into(),
            hnsw: HnswSettings::default(),
            payload_schema: Map::new(),
        }
    }

    fn point(index: usize, raw: Value, info: &CollectionDescriptor) -> Result<PointRecord, BridgeError> {
        parse_point(index, &raw)?.bind(info, "text-dense")
    }

    #[test]
    fn bare_list_goes_to_default_vector() {
        let info = info(&[("text-dense", 3)], &[]);
        let p = point(0, json!({"id": 1, "vector": [1, 2, 3]}), &info).unwrap();
        assert_eq!(
            p.vectors.get("text-dense"),
            Some(&VectorData::Dense(vec![1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn unnamed_collections_take_bare_lists() {
        let info = info(&[("", 2)], &[]);
        assert_eq!(default_vector_name(&info, "text-dense"), "");
    }

    #[test]
    fn wrong_dimension_names_the_point() {
        let info = info(&[("text-dense", 3)], &[]);
        let err = point(4, json!({"id": "a", "vector": [1, 2]}), &info).unwrap_err();
        assert_eq!(err.field(), Some("points"));
        assert!(err.message.contains("point 4"));
        assert!(err.message.contains("expects 3"));
    }

    #[test]
    fn unknown_vector_names_are_rejected() {
        let info = info(&[("text-dense", 2)], &["text-sparse"]);
        let err = point(0, json!({"id": 1, "vector": {"image": [1, 2]}}), &info).unwrap_err();
        assert!(err.message.contains("image"));
        let ok = point(
            0,
            json!({"id": 1, "vector": {"text-dense": [1, 2], "text-sparse": {"indices": [3], "values": [0.5]}}}),
            &info,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn missing_id_is_invalid() {
        let err = parse_point(0, &json!({"vector": [1]})).unwrap_err();
        assert_eq!(err.field(), Some("points"));
    }

    #[test]
    fn shape_errors_need_no_collection() {
        for raw in [
            json!({"id": 1, "vector": "nope"}),
            json!({"id": 1, "vector": {}}),
            json!({"id": 1, "vector": {"s": {"indices": [1, 2], "values": [0.5]}}}),
        ] {
            let err = parse_point(2, &raw).unwrap_err();
            assert!(err.message.contains("point 2"), "{raw}");
        }
    }
}
