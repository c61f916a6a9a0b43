// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical filters to Qdrant `must` / `should` / `must_not` clauses.

use serde_json::{Value, json};
use vtb_core::FilterExpression;
use vtb_core::filter::MAX_FILTER_DEPTH;
use vtb_error::{BridgeError, ErrorKind};

fn unsupported(reason: impl Into<String>) -> BridgeError {
    BridgeError::new(ErrorKind::TranslationUnsupported, reason.into()).with_context("field", "filter")
}

/// Translate a filter into a Qdrant filter object.
///
/// # Errors
///
/// [`ErrorKind::TranslationUnsupported`] for float, null, array or object
/// equality, an empty `or`, a range without finite bounds, an empty field
/// path, or a tree deeper than [`MAX_FILTER_DEPTH`].
pub fn to_backend_filter(expr: &FilterExpression) -> Result<Value, BridgeError> {
    let depth = expr.depth();
    if depth > MAX_FILTER_DEPTH {
        return Err(unsupported(format!(
            "filter nesting depth {depth} exceeds {MAX_FILTER_DEPTH}"
        )));
    }
    match expr {
        FilterExpression::Eq { .. } | FilterExpression::Range { .. } => {
            Ok(json!({ "must": [condition(expr)?] }))
        }
        _ => condition(expr),
    }
}

/// A single condition. Compound expressions become nested filter objects,
/// which Qdrant accepts anywhere a condition is expected.
fn condition(expr: &FilterExpression) -> Result<Value, BridgeError> {
    match expr {
        FilterExpression::Eq { field, value } => {
            check_field(field)?;
            Ok(json!({ "key": field, "match": { "value": match_value(field, value)? } }))
        }
        FilterExpression::Range {
            field,
            gt,
            gte,
            lt,
            lte,
        } => {
            check_field(field)?;
            let bounds = [("gt", gt), ("gte", gte), ("lt", lt), ("lte", lte)];
            let mut range = serde_json::Map::new();
            for (name, bound) in bounds {
                if let Some(b) = bound {
                    if !b.is_finite() {
                        return Err(unsupported(format!(
                            "range bound `{name}` on `{field}` is not finite"
                        )));
                    }
                    range.insert(name.to_string(), json!(b));
                }
            }
            if range.is_empty() {
                return Err(unsupported(format!("range on `{field}` has no bounds")));
            }
            Ok(json!({ "key": field, "range": range }))
        }
        FilterExpression::And { filters } => Ok(json!({ "must": conditions(filters)? })),
        FilterExpression::Or { filters } => {
            if filters.is_empty() {
                return Err(unsupported("`or` needs at least one filter"));
            }
            Ok(json!({ "should": conditions(filters)? }))
        }
        FilterExpression::Not { filter } => Ok(json!({ "must_not": [condition(filter)?] })),
    }
}

fn conditions(filters: &[FilterExpression]) -> Result<Vec<Value>, BridgeError> {
    filters.iter().map(condition).collect()
}

fn check_field(field: &str) -> Result<(), BridgeError> {
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(unsupported(format!("invalid field path `{field}`")));
    }
    Ok(())
}

fn match_value(field: &str, value: &Value) -> Result<Value, BridgeError> {
    match value {
        Value::String(_) | Value::Bool(_) => Ok(value.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(_) => Err(unsupported(format!(
            "equality on float value for `{field}`; use a range instead"
        ))),
        Value::Null => Err(unsupported(format!("equality with null on `{field}`"))),
        Value::Array(_) | Value::Object(_) => Err(unsupported(format!(
            "equality with a composite value on `{field}`"
        ))),
    }
}
