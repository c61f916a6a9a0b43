// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tool and parameter descriptions, rendered to JSON Schema for `tools/list`.

use serde_json::{Map, Value, json};

/// Name of the confirmation flag every destructive tool takes.
pub const CONFIRM: &str = "confirm";

/// Element type of an array parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    /// Finite numbers (vector components).
    Number,
    /// Unsigned integers or strings.
    PointId,
    /// JSON objects, checked by the handler.
    Object,
}

/// Type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Integer; integral floats and integer strings are coerced.
    Integer,
    /// Finite number; numeric strings are coerced.
    Number,
    /// Boolean; `"true"` / `"false"` are coerced.
    Boolean,
    /// Arbitrary JSON object.
    Object,
    /// A canonical filter expression.
    Filter,
    /// Array of the given element type.
    Array(ItemType),
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Argument name.
    pub name: String,
    /// Expected type.
    pub ty: ParamType,
    /// Shown to the agent.
    pub description: String,
    /// Whether the argument must be present.
    pub required: bool,
    /// Value used when the argument is omitted.
    pub default: Option<Value>,
    /// Inclusive lower bound for numbers.
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers.
    pub maximum: Option<f64>,
    /// Minimum array length.
    pub min_items: Option<usize>,
    /// Maximum array length.
    pub max_items: Option<usize>,
    /// Allowed string values, compared case-insensitively.
    pub one_of: Vec<String>,
}

impl ParamSpec {
    /// An optional parameter with no default.
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            required: false,
            default: None,
            minimum: None,
            maximum: None,
            min_items: None,
            max_items: None,
            one_of: Vec::new(),
        }
    }

    /// Set the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when omitted.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Inclusive numeric bounds.
    pub fn range(mut self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.minimum = Some(min.into());
        self.maximum = Some(max.into());
        self
    }

    /// Inclusive lower bound only.
    pub fn at_least(mut self, min: impl Into<f64>) -> Self {
        self.minimum = Some(min.into());
        self
    }

    /// Array length bounds.
    pub fn items(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_items = Some(min);
        self.max_items = max;
        self
    }

    /// Restrict a string to a fixed set.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.one_of = values.iter().map(|v| v.to_string()).collect();
        self
    }

    /// JSON Schema of this parameter.
    pub fn schema(&self) -> Value {
        let mut s = Map::new();
        match self.ty {
            ParamType::String => {
                s.insert("type".into(), json!("string"));
            }
            ParamType::Integer => {
                s.insert("type".into(), json!("integer"));
            }
            ParamType::Number => {
                s.insert("type".into(), json!("number"));
            }
            ParamType::Boolean => {
                s.insert("type".into(), json!("boolean"));
            }
            ParamType::Object => {
                s.insert("type".into(), json!("object"));
            }
            ParamType::Filter => {
                s.insert("type".into(), json!("object"));
                s.insert("required".into(), json!(["op"]));
                s.insert(
                    "properties".into(),
                    json!({ "op": { "type": "string", "enum": ["eq", "range", "and", "or", "not"] } }),
                );
            }
            ParamType::Array(item) => {
                s.insert("type".into(), json!("array"));
                let items = match item {
                    ItemType::Number => json!({ "type": "number" }),
                    ItemType::PointId => json!({ "type": ["integer", "string"] }),
                    ItemType::Object => json!({ "type": "object" }),
                };
                s.insert("items".into(), items);
            }
        }
        if !self.description.is_empty() {
            s.insert("description".into(), json!(self.description));
        }
        if let Some(d) = &self.default {
            s.insert("default".into(), d.clone());
        }
        if let Some(min) = self.minimum {
            s.insert("minimum".into(), number(min));
        }
        if let Some(max) = self.maximum {
            s.insert("maximum".into(), number(max));
        }
        if let Some(n) = self.min_items {
            s.insert("minItems".into(), json!(n));
        }
        if let Some(n) = self.max_items {
            s.insert("maxItems".into(), json!(n));
        }
        if !self.one_of.is_empty() {
            s.insert("enum".into(), json!(self.one_of));
        }
        Value::Object(s)
    }
}

/// Integral bounds render as integers so `integer` schemas stay tidy.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// An immutable tool description.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Shown to the agent.
    pub description: String,
    /// Whether the tool destroys data and needs `confirm: true`.
    pub destructive: bool,
    /// Parameters in declaration order.
    pub params: Vec<ParamSpec>,
}

impl ToolDefinition {
    /// A tool with no parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            destructive: false,
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Mark as destructive and add the `confirm` flag.
    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self.params.push(
            ParamSpec::new(CONFIRM, ParamType::Boolean)
                .describe("Must be true; this operation permanently deletes data")
                .default(false),
        );
        self
    }

    /// Look up a parameter by name.
    pub fn get_param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema of the argument object.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// The `tools/list` entry for this tool.
    pub fn to_mcp(&self) -> Value {
        let mut tool = json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        });
        if self.destructive {
            tool["annotations"] = json!({ "destructiveHint": true });
        }
        tool
    }
}
