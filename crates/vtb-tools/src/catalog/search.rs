// SPDX-License-Identifier: MIT OR Apache-2.0
//! Similarity search and recommendation tools.

use super::common::{
    collection_param, dense_vector, filter_param, flag_param, hit_json, parse_vector, plural,
    scope_param, vector_name_param,
};
use crate::ToolOutput;
use crate::args::{Arguments, parse_filter};
use crate::context::CallContext;
use crate::registry::{ToolHandler, handler};
use crate::schema::{ItemType, ParamSpec, ParamType, ToolDefinition};
use serde::Deserialize;
use serde_json::{Value, json};
use vtb_config::BridgeConfig;
use vtb_core::{FilterExpression, RecommendQuery, SearchQuery};
use vtb_error::BridgeError;
use vtb_translate::{CursorPosition, CursorScope, decode_cursor, encode_cursor};

const DEFAULT_LIMIT: u64 = 10;

pub(crate) fn tools(config: &BridgeConfig) -> Vec<(ToolDefinition, ToolHandler)> {
    let limits = &config.limits;
    let limit = || {
        ParamSpec::new("limit", ParamType::Integer)
            .describe("Maximum number of hits")
            .range(1, limits.max_search_limit as f64)
            .default(DEFAULT_LIMIT.min(limits.max_search_limit))
    };
    let threshold = || {
        ParamSpec::new("score_threshold", ParamType::Number)
            .describe("Only return hits scoring at least this much (distances: at most)")
    };
    vec![
        (
            ToolDefinition::new(
                "qdrant_search_vectors",
                "Nearest-neighbour search with a query vector; best hits first",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(
                ParamSpec::new("vector", ParamType::Array(ItemType::Number))
                    .describe("Query vector")
                    .items(1, None)
                    .required(),
            )
            .param(limit())
            .param(threshold())
            .param(filter_param())
            .param(vector_name_param(config))
            .param(flag_param("with_payload", "Include payloads", true))
            .param(flag_param("with_vector", "Include vectors", false))
            .param(
                ParamSpec::new("cursor", ParamType::String)
                    .describe("next_cursor from the previous page of the same search"),
            ),
            handler(search_vectors),
        ),
        (
            ToolDefinition::new(
                "qdrant_search_batch",
                "Run several searches in one round trip. Each query: {vector, limit, score_threshold, filter}",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(
                ParamSpec::new("queries", ParamType::Array(ItemType::Object))
                    .describe("Search queries")
                    .items(1, Some(limits.max_batch_queries as usize))
                    .required(),
            )
            .param(vector_name_param(config))
            .param(flag_param("with_payload", "Include payloads", true)),
            handler(search_batch),
        ),
        (
            ToolDefinition::new(
                "qdrant_recommend_points",
                "Find points like the positive examples and unlike the negative ones",
            )
            .param(collection_param(config))
            .param(scope_param(config))
            .param(
                ParamSpec::new("positive", ParamType::Array(ItemType::PointId))
                    .describe("Ids of points to move towards")
                    .items(1, Some(limits.max_ids as usize))
                    .required(),
            )
            .param(
                ParamSpec::new("negative", ParamType::Array(ItemType::PointId))
                    .describe("Ids of points to move away from")
                    .items(0, Some(limits.max_ids as usize)),
            )
            .param(limit())
            .param(threshold())
            .param(filter_param())
            .param(vector_name_param(config))
            .param(flag_param("with_payload", "Include payloads", true)),
            handler(recommend_points),
        ),
    ]
}

/// Everything besides collection and filter that decides which hits a page holds.
fn search_fingerprint(vector_name: &str, threshold: Option<f64>, vector: &[f64]) -> String {
    let vector = serde_json::to_string(vector).unwrap_or_default();
    format!("search|{vector_name}|{threshold:?}|{vector}")
}

async fn search_vectors(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let vector = parse_vector("vector", args.get("vector").unwrap_or(&Value::Null))?;
    let filter = args.filter("filter")?;
    let threshold = args.f64("score_threshold");
    let vector_name = args
        .str("vector_name")
        .unwrap_or(&ctx.defaults().vector_name)
        .to_string();
    let limit = args.u64("limit").unwrap_or(DEFAULT_LIMIT);

    let fingerprint = search_fingerprint(&vector_name, threshold, &vector);
    let scope = CursorScope {
        collection: name.physical(),
        filter: filter.as_ref(),
        query: &fingerprint,
    };
    let offset = match args.str("cursor") {
        None => 0,
        Some(token) => match decode_cursor(token, &scope)? {
            CursorPosition::Skip(k) => k,
            CursorPosition::Point(_) => {
                return Err(BridgeError::invalid_argument("cursor", "malformed cursor"));
            }
        },
    };

    let query = SearchQuery {
        vector_name: vector_name.clone(),
        vector,
        filter: filter.clone(),
        score_threshold: threshold,
        limit,
        offset,
        with_payload: args.flag("with_payload"),
        with_vector: args.flag("with_vector"),
    };
    let hits = ctx.backend.search(&name, &query).await?;
    let next_cursor = (hits.len() as u64 == limit)
        .then(|| encode_cursor(&scope, &CursorPosition::Skip(offset + limit)));
    let results: Vec<Value> = hits.iter().map(hit_json).collect();
    let summary = match hits.first() {
        Some(best) => format!(
            "{}, best {} ({:.4})",
            plural(hits.len(), "hit", "hits"),
            best.id,
            best.score
        ),
        None => "no hits".to_string(),
    };
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "results": results,
        "count": results.len(),
        "vector_name": vector_name,
        "score_threshold": threshold,
        "next_cursor": next_cursor,
    }))
    .with_summary(summary))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuery {
    vector: Value,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    score_threshold: Option<f64>,
    #[serde(default)]
    filter: Option<Value>,
}

#[derive(Debug)]
struct BatchEntry {
    vector: Vec<f64>,
    limit: u64,
    score_threshold: Option<f64>,
    filter: Option<FilterExpression>,
}

fn parse_query(index: usize, raw: &Value, max_limit: u64) -> Result<BatchEntry, BridgeError> {
    let invalid = |reason: String| {
        BridgeError::invalid_argument("queries", format_args!("query {index}: {reason}"))
    };
    let raw = RawQuery::deserialize(raw).map_err(|e| invalid(e.to_string()))?;
    let vector = dense_vector(&raw.vector).map_err(invalid)?;
    let limit = raw.limit.unwrap_or(DEFAULT_LIMIT.min(max_limit));
    if limit == 0 || limit > max_limit {
        return Err(invalid(format!("limit must be between 1 and {max_limit}, got {limit}")));
    }
    let filter = raw
        .filter
        .filter(|f| !f.is_null())
        .map(|f| parse_filter("queries", &f))
        .transpose()?;
    Ok(BatchEntry {
        vector,
        limit,
        score_threshold: raw.score_threshold,
        filter,
    })
}

async fn search_batch(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let vector_name = args
        .str("vector_name")
        .unwrap_or(&ctx.defaults().vector_name)
        .to_string();
    let with_payload = args.flag("with_payload");
    let max_limit = ctx.limits().max_search_limit;
    let queries = args
        .array("queries")
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_query(i, raw, max_limit))
        .map(|entry| {
            entry.map(|e| SearchQuery {
                vector_name: vector_name.clone(),
                vector: e.vector,
                filter: e.filter,
                score_threshold: e.score_threshold,
                limit: e.limit,
                offset: 0,
                with_payload,
                with_vector: false,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let results = ctx.backend.search_batch(&name, &queries).await?;
    let batch: Vec<Vec<Value>> = results
        .iter()
        .map(|hits| hits.iter().map(hit_json).collect())
        .collect();
    let total: usize = batch.iter().map(Vec::len).sum();
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "batch_results": batch,
        "query_count": queries.len(),
    }))
    .with_summary(format!(
        "{} across {}",
        plural(total, "hit", "hits"),
        plural(queries.len(), "query", "queries")
    )))
}

async fn recommend_points(ctx: CallContext, args: Arguments) -> Result<ToolOutput, BridgeError> {
    let name = ctx.collection(&args, "collection")?;
    let positive = args.point_ids("positive")?;
    if positive.is_empty() {
        return Err(BridgeError::invalid_argument(
            "positive",
            "at least one positive example is required",
        ));
    }
    let negative = args.point_ids("negative")?;
    let query = RecommendQuery {
        positive,
        negative,
        vector_name: args
            .str("vector_name")
            .unwrap_or(&ctx.defaults().vector_name)
            .to_string(),
        filter: args.filter("filter")?,
        score_threshold: args.f64("score_threshold"),
        limit: args.u64("limit").unwrap_or(DEFAULT_LIMIT),
        with_payload: args.flag("with_payload"),
        with_vector: false,
    };
    let hits = ctx.backend.recommend(&name, &query).await?;
    let recommendations: Vec<Value> = hits.iter().map(hit_json).collect();
    Ok(ToolOutput::new(json!({
        "collection": name.logical(),
        "recommendations": recommendations,
        "count": recommendations.len(),
        "positive_examples": query.positive,
        "negative_examples": query.negative,
    }))
    .with_summary(plural(hits.len(), "recommendation", "recommendations")))
}
