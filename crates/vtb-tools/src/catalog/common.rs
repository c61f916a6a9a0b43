// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter builders and payload shaping shared by the catalog modules.

use crate::context::SCOPE;
use crate::schema::{ParamSpec, ParamType};
use serde::Serialize;
use serde_json::{Map, Value, json};
use vtb_config::BridgeConfig;
use vtb_core::{NamedVectors, PointRecord, ScoredPoint, VectorData};
use vtb_error::BridgeError;
use vtb_translate::UNNAMED_VECTOR;

/// Required collection name of the lifecycle tools.
pub(crate) fn name_param(what: &str) -> ParamSpec {
    ParamSpec::new("name", ParamType::String)
        .describe(format!("Name of the collection to {what}"))
        .required()
}

/// Collection name, defaulting to the configured collection.
pub(crate) fn collection_param(config: &BridgeConfig) -> ParamSpec {
    ParamSpec::new("collection", ParamType::String)
        .describe("Name of the collection")
        .default(config.defaults.collection.clone())
}

/// Isolation scope, defaulting to the configured scope.
pub(crate) fn scope_param(config: &BridgeConfig) -> ParamSpec {
    ParamSpec::new(SCOPE, ParamType::String)
        .describe("Isolation scope; the collection is resolved inside it")
        .default(config.defaults.scope.clone())
}

pub(crate) fn filter_param() -> ParamSpec {
    ParamSpec::new("filter", ParamType::Filter).describe(
        "Payload filter: {op: eq|range|and|or|not, ...}, e.g. {\"op\":\"eq\",\"field\":\"lang\",\"value\":\"rust\"}",
    )
}

pub(crate) fn vector_name_param(config: &BridgeConfig) -> ParamSpec {
    ParamSpec::new("vector_name", ParamType::String)
        .describe("Named vector space to use")
        .default(config.defaults.vector_name.clone())
}

pub(crate) fn flag_param(name: &str, description: &str, default: bool) -> ParamSpec {
    ParamSpec::new(name, ParamType::Boolean)
        .describe(description)
        .default(default)
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, BridgeError> {
    Ok(serde_json::to_value(value)?)
}

/// Render vectors the way they were written: a bare list for collections
/// with one unnamed vector, a map otherwise.
fn vectors_json(vectors: &NamedVectors) -> Value {
    match vectors.get(UNNAMED_VECTOR) {
        Some(VectorData::Dense(v)) if vectors.len() == 1 => json!(v),
        _ => json!(vectors),
    }
}

/// A stored point as returned to callers.
pub(crate) fn point_json(point: &PointRecord, with_payload: bool, with_vector: bool) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), json!(point.id));
    if with_payload && !point.payload.is_empty() {
        out.insert("payload".into(), Value::Object(point.payload.clone()));
    }
    if with_vector && !point.vectors.is_empty() {
        out.insert("vector".into(), vectors_json(&point.vectors));
    }
    Value::Object(out)
}

/// A search or recommend hit as returned to callers.
pub(crate) fn hit_json(hit: &ScoredPoint) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), json!(hit.id));
    out.insert("score".into(), json!(hit.score));
    if let Some(payload) = hit.payload.as_ref().filter(|p| !p.is_empty()) {
        out.insert("payload".into(), Value::Object(payload.clone()));
    }
    if let Some(vectors) = hit.vectors.as_ref().filter(|v| !v.is_empty()) {
        out.insert("vector".into(), vectors_json(vectors));
    }
    Value::Object(out)
}

/// A dense vector of finite numbers, or why not.
pub(crate) fn dense_vector(value: &Value) -> Result<Vec<f64>, String> {
    let items = value
        .as_array()
        .ok_or("expected an array of numbers")?;
    if items.is_empty() {
        return Err("vector must not be empty".into());
    }
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .filter(|f| f.is_finite())
                .ok_or_else(|| "vector components must be finite numbers".to_string())
        })
        .collect()
}

/// A dense vector argument.
pub(crate) fn parse_vector(field: &str, value: &Value) -> Result<Vec<f64>, BridgeError> {
    dense_vector(value).map_err(|reason| BridgeError::invalid_argument(field, reason))
}

pub(crate) fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("1 {one}")
    } else {
        format!("{n} {many}")
    }
}
