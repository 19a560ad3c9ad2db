// src/supervisor/validation.rs
// Tool schema types and the argument validate/normalize pipeline (§4.1
// execution path steps 1-2, §8 invariant 2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One property in a tool's input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolSchema {
    #[serde(default)]
    pub properties: HashMap<String, ParameterSpec>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Parse a tool's wire-format `inputSchema` (JSON-Schema-ish object)
    /// into the documented `{properties, required}` shape.
    pub fn from_wire(value: &Value) -> Self {
        let properties = value
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|obj| {
                obj.iter()
                    .map(|(name, spec)| {
                        let param_type = spec
                            .get("type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("string")
                            .to_string();
                        let description = spec
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let default = spec.get("default").cloned();
                        (name.clone(), ParameterSpec { param_type, description, default })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let required = value
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        Self { properties, required }
    }
}

/// Validate that all required keys are present and non-null, and that
/// every provided key type-checks against the schema (§3 invariants).
/// Returns the list of problems found; empty means valid.
pub fn validate_args(schema: &ToolSchema, args: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    let obj = args.as_object().cloned().unwrap_or_default();

    for key in &schema.required {
        match obj.get(key) {
            None => problems.push(format!("missing required argument '{key}'")),
            Some(Value::Null) => problems.push(format!("required argument '{key}' is null")),
            Some(_) => {}
        }
    }

    for (key, value) in &obj {
        if let Some(spec) = schema.properties.get(key) {
            if !validate_parameter_type(value, &spec.param_type) {
                problems.push(format!("argument '{key}' does not match type '{}'", spec.param_type));
            }
        }
    }

    problems
}

/// Check whether `value` type-checks against a declared schema type.
pub fn validate_parameter_type(value: &Value, declared_type: &str) -> bool {
    match declared_type {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Apply defaults for missing optionals and coerce scalar types when
/// trivially convertible (string<->number, string<->bool). Idempotent:
/// `normalize_args(normalize_args(x)) == normalize_args(x)` (§8).
pub fn normalize_args(schema: &ToolSchema, args: &Value) -> Value {
    let source = args.as_object().cloned().unwrap_or_default();
    let mut obj = serde_json::Map::new();

    for (name, spec) in &schema.properties {
        match source.get(name) {
            Some(current) => {
                obj.insert(name.clone(), coerce_scalar(current.clone(), &spec.param_type));
            }
            None => {
                if let Some(default) = &spec.default {
                    obj.insert(name.clone(), default.clone());
                }
            }
        }
    }

    Value::Object(obj)
}

fn coerce_scalar(value: Value, declared_type: &str) -> Value {
    match (declared_type, &value) {
        ("string", Value::Number(n)) => Value::String(n.to_string()),
        ("string", Value::Bool(b)) => Value::String(b.to_string()),
        ("integer" | "number", Value::String(s)) => {
            s.parse::<f64>().ok().and_then(|n| serde_json::Number::from_f64(n)).map(Value::Number).unwrap_or(value)
        }
        ("boolean", Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value,
        },
        _ => value,
    }
}
