// SPDX-License-Identifier: MIT OR Apache-2.0
//! Argument validation and coercion.
//!
//! [`validate`] runs before any handler code: every failure is an
//! `InvalidArgument` naming the offending field, and nothing has been sent to
//! the backend yet.

use crate::schema::{ItemType, ParamSpec, ParamType, ToolDefinition};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use vtb_core::filter::MAX_FILTER_DEPTH;
use vtb_core::{FilterExpression, PointId};
use vtb_error::BridgeError;

/// Validated arguments, with defaults filled in and types coerced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    /// Wrap an already validated map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Raw value of an argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// String argument.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Non-negative integer argument.
    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    /// Numeric argument.
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Boolean argument; absent is `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Array argument; absent is empty.
    pub fn array(&self, name: &str) -> &[Value] {
        self.get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Filter argument, decoded.
    pub fn filter(&self, name: &str) -> Result<Option<FilterExpression>, BridgeError> {
        self.get(name).map(|v| parse_filter(name, v)).transpose()
    }

    /// Point id list argument, decoded.
    pub fn point_ids(&self, name: &str) -> Result<Vec<PointId>, BridgeError> {
        self.array(name)
            .iter()
            .map(|v| {
                PointId::deserialize(v).map_err(|_| {
                    BridgeError::invalid_argument(
                        name,
                        "point ids are unsigned integers or strings",
                    )
                })
            })
            .collect()
    }

    /// The underlying map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Decode a canonical filter, naming `field` on failure.
pub fn parse_filter(field: &str, value: &Value) -> Result<FilterExpression, BridgeError> {
    decode_filter(value).map_err(|reason| BridgeError::invalid_argument(field, reason))
}

fn decode_filter(value: &Value) -> Result<FilterExpression, String> {
    let filter =
        FilterExpression::deserialize(value).map_err(|e| format!("not a valid filter: {e}"))?;
    if filter.depth() > MAX_FILTER_DEPTH {
        return Err(format!("filter nests deeper than {MAX_FILTER_DEPTH} levels"));
    }
    Ok(filter)
}

/// Check `raw` against `def`, filling defaults and coercing types.
///
/// # Errors
///
/// `InvalidArgument` naming the first offending field: an unknown argument,
/// a missing required one, an uncoercible type, an enum or bound violation.
pub fn validate(def: &ToolDefinition, mut raw: Map<String, Value>) -> Result<Arguments, BridgeError> {
    let mut unknown: Vec<&String> = raw
        .keys()
        .filter(|k| def.get_param(k).is_none())
        .collect();
    unknown.sort();
    if let Some(first) = unknown.first() {
        return Err(BridgeError::invalid_argument(
            first.as_str(),
            format_args!("unknown argument for `{}`", def.name),
        ));
    }

    let mut out = Map::new();
    for spec in &def.params {
        match raw.remove(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(BridgeError::invalid_argument(&spec.name, "is required"));
                }
                if let Some(d) = &spec.default {
                    out.insert(spec.name.clone(), d.clone());
                }
            }
            Some(v) => {
                let v = coerce(spec, v).map_err(|r| BridgeError::invalid_argument(&spec.name, r))?;
                out.insert(spec.name.clone(), v);
            }
        }
    }
    Ok(Arguments(out))
}

fn coerce(spec: &ParamSpec, v: Value) -> Result<Value, String> {
    let v = match spec.ty {
        ParamType::String => match v {
            Value::String(s) => Value::String(one_of(spec, s)?),
            _ => return Err("expected a string".into()),
        },
        ParamType::Integer => coerce_integer(&v).ok_or("expected an integer")?,
        ParamType::Number => coerce_number(&v).ok_or("expected a number")?,
        ParamType::Boolean => coerce_bool(&v).ok_or("expected a boolean")?,
        ParamType::Object => match v {
            Value::Object(_) => v,
            _ => return Err("expected an object".into()),
        },
        ParamType::Filter => {
            decode_filter(&v)?;
            v
        }
        ParamType::Array(item) => match v {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, x)| coerce_item(item, x).map_err(|r| format!("item {i}: {r}")))
                    .collect::<Result<_, _>>()?,
            ),
            _ => return Err("expected an array".into()),
        },
    };
    check_bounds(spec, &v)?;
    Ok(v)
}

fn coerce_integer(v: &Value) -> Option<Value> {
    match v {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(v.clone()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then(|| json!(f as i64))
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Value::from)
                .or_else(|_| s.parse::<u64>().map(Value::from))
                .ok()
        }
        _ => None,
    }
}

fn coerce_number(v: &Value) -> Option<Value> {
    match v {
        Value::Number(_) => Some(v.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| json!(f)),
        _ => None,
    }
}

fn coerce_bool(v: &Value) -> Option<Value> {
    match v {
        Value::Bool(_) => Some(v.clone()),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
        _ => None,
    }
}

fn coerce_item(item: ItemType, v: Value) -> Result<Value, String> {
    match item {
        ItemType::Number => coerce_number(&v).ok_or_else(|| "expected a number".into()),
        ItemType::PointId => {
            let valid = match &v {
                Value::Number(n) => n.is_u64(),
                Value::String(s) => !s.is_empty(),
                _ => false,
            };
            if valid {
                Ok(v)
            } else {
                Err("point ids are unsigned integers or non-empty strings".into())
            }
        }
        ItemType::Object => match v {
            Value::Object(_) => Ok(v),
            _ => Err("expected an object".into()),
        },
    }
}

fn one_of(spec: &ParamSpec, s: String) -> Result<String, String> {
    if spec.one_of.is_empty() {
        return Ok(s);
    }
    spec.one_of
        .iter()
        .find(|allowed| allowed.eq_ignore_ascii_case(&s))
        .cloned()
        .ok_or_else(|| format!("must be one of: {}", spec.one_of.join(", ")))
}

fn check_bounds(spec: &ParamSpec, v: &Value) -> Result<(), String> {
    if let Some(n) = v.as_f64() {
        match (spec.minimum, spec.maximum) {
            (Some(lo), Some(hi)) if n < lo || n > hi => {
                return Err(format!("must be between {lo} and {hi}, got {v}"));
            }
            (Some(lo), None) if n < lo => return Err(format!("must be at least {lo}, got {v}")),
            (None, Some(hi)) if n > hi => return Err(format!("must be at most {hi}, got {v}")),
            _ => {}
        }
    }
    if let Some(items) = v.as_array() {
        if let Some(min) = spec.min_items
            && items.len() < min
        {
            return Err(format!("must contain at least {min} item(s)"));
        }
        if let Some(max) = spec.max_items
            && items.len() > max
        {
            return Err(format!("must contain at most {max} items, got {}", items.len()));
        }
    }
    Ok(())
}
