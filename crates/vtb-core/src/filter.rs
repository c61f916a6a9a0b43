// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical filter expressions over point payloads.
//!
//! A [`FilterExpression`] is a tagged tree serialised with an `"op"` field:
//!
//! ```json
//! {"op": "and", "filters": [
//!     {"op": "eq", "field": "lang", "value": "rust"},
//!     {"op": "range", "field": "stars", "gte": 10}
//! ]}
//! ```
//!
//! The tree is backend-independent. `vtb-translate` owns the mapping to the
//! vector store's syntax; [`FilterExpression::matches`] evaluates it locally
//! for in-memory stores.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on the nesting depth of a filter tree.
pub const MAX_FILTER_DEPTH: usize = 32;

/// Boolean expression over payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpression {
    /// Field equals a keyword, integer or boolean.
    Eq {
        /// Dotted payload path.
        field: String,
        /// Value to compare against.
        value: Value,
    },
    /// Numeric field within bounds. At least one bound is required.
    Range {
        /// Dotted payload path.
        field: String,
        /// Exclusive lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gt: Option<f64>,
        /// Inclusive lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<f64>,
        /// Exclusive upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lt: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<f64>,
    },
    /// Every child matches. An empty list matches everything.
    And {
        /// Children.
        filters: Vec<FilterExpression>,
    },
    /// At least one child matches.
    Or {
        /// Children.
        filters: Vec<FilterExpression>,
    },
    /// The child does not match.
    Not {
        /// Negated child.
        filter: Box<FilterExpression>,
    },
}

impl FilterExpression {
    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `lo <= field <= hi`, either side optional.
    pub fn between(field: impl Into<String>, lo: Option<f64>, hi: Option<f64>) -> Self {
        Self::Range {
            field: field.into(),
            gt: None,
            gte: lo,
            lt: None,
            lte: hi,
        }
    }

    /// Conjunction.
    pub fn and(filters: Vec<FilterExpression>) -> Self {
        Self::And { filters }
    }

    /// Disjunction.
    pub fn or(filters: Vec<FilterExpression>) -> Self {
        Self::Or { filters }
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: FilterExpression) -> Self {
        Self::Not {
            filter: Box::new(filter),
        }
    }

    /// Nesting depth; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Eq { .. } | Self::Range { .. } => 1,
            Self::And { filters } | Self::Or { filters } => {
                1 + filters.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Not { filter } => 1 + filter.depth(),
        }
    }

    /// Stable JSON text used to fingerprint the filter.
    ///
    /// Object keys inside `eq` values are emitted in sorted order so that two
    /// equal trees always produce the same text.
    pub fn canonical_json(&self) -> String {
        serde_json::to_value(self)
            .map(|v| sorted(&v).to_string())
            .unwrap_or_default()
    }

    /// Evaluate against a payload.
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        match self {
            Self::Eq { field, value } => lookup(payload, field).is_some_and(|v| match v {
                // Keyword arrays match when any element matches.
                Value::Array(items) => items.iter().any(|item| item == value),
                other => other == value,
            }),
            Self::Range {
                field,
                gt,
                gte,
                lt,
                lte,
            } => lookup(payload, field)
                .and_then(Value::as_f64)
                .is_some_and(|x| {
                    gt.is_none_or(|b| x > b)
                        && gte.is_none_or(|b| x >= b)
                        && lt.is_none_or(|b| x < b)
                        && lte.is_none_or(|b| x <= b)
                }),
            Self::And { filters } => filters.iter().all(|f| f.matches(payload)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(payload)),
            Self::Not { filter } => !filter.matches(payload),
        }
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn lookup<'a>(payload: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = payload.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn serde_shape_uses_op_tag() {
        let f = FilterExpression::and(vec![
            FilterExpression::eq("lang", "rust"),
            FilterExpression::between("stars", Some(10.0), None),
        ]);
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(
            v,
            json!({"op": "and", "filters": [
                {"op": "eq", "field": "lang", "value": "rust"},
                {"op": "range", "field": "stars", "gte": 10.0}
            ]})
        );
        let back: FilterExpression = serde_json::from_value(v).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = serde_json::from_value::<FilterExpression>(json!({"op": "like", "field": "a"}));
        assert!(err.is_err());
    }

    #[test]
    fn eq_matches_scalars_and_arrays() {
        let p = payload(json!({"lang": "rust", "tags": ["a", "b"], "n": 3}));
        assert!(FilterExpression::eq("lang", "rust").matches(&p));
        assert!(!FilterExpression::eq("lang", "go").matches(&p));
        assert!(FilterExpression::eq("tags", "b").matches(&p));
        assert!(FilterExpression::eq("n", 3).matches(&p));
        assert!(!FilterExpression::eq("missing", 3).matches(&p));
    }

    #[test]
    fn nested_paths_resolve() {
        let p = payload(json!({"meta": {"author": {"name": "ana"}}}));
        assert!(FilterExpression::eq("meta.author.name", "ana").matches(&p));
        assert!(!FilterExpression::eq("meta.author.id", "ana").matches(&p));
    }

    #[test]
    fn range_bounds_are_respected() {
        let p = payload(json!({"score": 5}));
        let exclusive = FilterExpression::Range {
            field: "score".into(),
            gt: Some(5.0),
            gte: None,
            lt: None,
            lte: None,
        };
        assert!(!exclusive.matches(&p));
        assert!(FilterExpression::between("score", Some(5.0), Some(5.0)).matches(&p));
        assert!(!FilterExpression::between("score", None, Some(4.9)).matches(&p));
    }

    #[test]
    fn logical_combinators() {
        let p = payload(json!({"a": 1, "b": 2}));
        let a = FilterExpression::eq("a", 1);
        let b_wrong = FilterExpression::eq("b", 3);
        assert!(FilterExpression::or(vec![a.clone(), b_wrong.clone()]).matches(&p));
        assert!(!FilterExpression::and(vec![a.clone(), b_wrong.clone()]).matches(&p));
        assert!(FilterExpression::not(b_wrong).matches(&p));
        assert!(FilterExpression::and(vec![]).matches(&p));
    }

    #[test]
    fn depth_counts_levels() {
        let leaf = FilterExpression::eq("a", 1);
        assert_eq!(leaf.depth(), 1);
        let nested = FilterExpression::not(FilterExpression::and(vec![leaf]));
        assert_eq!(nested.depth(), 3);
        assert_eq!(FilterExpression::or(vec![]).depth(), 1);
    }

    #[test]
    fn canonical_json_is_key_order_independent() {
        let a: FilterExpression =
            serde_json::from_str(r#"{"value": {"x": 1, "y": 2}, "field": "f", "op": "eq"}"#)
                .unwrap();
        let b: FilterExpression =
            serde_json::from_str(r#"{"op": "eq", "field": "f", "value": {"y": 2, "x": 1}}"#)
                .unwrap();
        assert_eq!(a.canonical_json(), b.canonical_json());
    }
}
