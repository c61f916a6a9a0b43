// SPDX-License-Identifier: MIT OR Apache-2.0
//! Every advertised input schema is valid JSON Schema and agrees with the
//! argument validator.

use serde_json::{Value, json};
use vtb_config::BridgeConfig;
use vtb_tools::{ToolResult, builtin_registry, validate};

// ── helpers ──────────────────────────────────────────────────────────

fn schema_of(tool: &str) -> Value {
    let reg = builtin_registry(&BridgeConfig::default()).unwrap();
    reg.get(tool).unwrap().definition.input_schema()
}

fn accepts(tool: &str, instance: Value) -> bool {
    let validator = jsonschema::validator_for(&schema_of(tool)).expect("schema should compile");
    validator.is_valid(&instance)
}

// ── compilation ──────────────────────────────────────────────────────

#[test]
fn every_input_schema_compiles() {
    let reg = builtin_registry(&BridgeConfig::default()).unwrap();
    for def in reg.definitions() {
        let schema = def.input_schema();
        assert!(
            jsonschema::validator_for(&schema).is_ok(),
            "{} has an invalid input schema: {schema}",
            def.name
        );
    }
}

#[test]
fn every_tool_has_a_description_and_mcp_entry() {
    let reg = builtin_registry(&BridgeConfig::default()).unwrap();
    for def in reg.definitions() {
        assert!(!def.description.is_empty(), "{}", def.name);
        let entry = def.to_mcp();
        assert_eq!(entry["name"], json!(def.name));
        assert_eq!(entry["inputSchema"]["type"], json!("object"));
    }
}

#[test]
fn tool_result_schema_compiles_and_matches_results() {
    let schema = serde_json::to_value(schemars::schema_for!(ToolResult)).unwrap();
    let validator = jsonschema::validator_for(&schema).expect("ToolResult schema must be valid");
    let ok = serde_json::to_value(ToolResult::ok(vtb_tools::ToolOutput::new(json!({"n": 1})))).unwrap();
    assert!(validator.is_valid(&ok));
    let err = serde_json::to_value(ToolResult::err(&vtb_error::BridgeError::unknown_tool("x"))).unwrap();
    assert!(validator.is_valid(&err));
}

// ── agreement with the validator ─────────────────────────────────────

#[test]
fn schema_and_validator_agree_on_search_limits() {
    let reg = builtin_registry(&BridgeConfig::default()).unwrap();
    let def = &reg.get("qdrant_search_vectors").unwrap().definition;

    let good = json!({"vector": [0.1, 0.2], "limit": 100});
    assert!(accepts("qdrant_search_vectors", good.clone()));
    assert!(validate(def, good.as_object().cloned().unwrap()).is_ok());

    let bad = json!({"vector": [0.1, 0.2], "limit": 101});
    assert!(!accepts("qdrant_search_vectors", bad.clone()));
    assert!(validate(def, bad.as_object().cloned().unwrap()).is_err());
}

#[test]
fn unknown_arguments_are_rejected_by_schema() {
    assert!(!accepts("qdrant_list_collections", json!({"colour": "blue"})));
    assert!(accepts("qdrant_list_collections", json!({"scope": "team_a"})));
}

#[test]
fn lifecycle_tools_require_a_name() {
    for tool in [
        "qdrant_create_collection",
        "qdrant_delete_collection",
        "qdrant_get_collection_info",
        "qdrant_update_collection",
    ] {
        assert_eq!(schema_of(tool)["required"], json!(["name"]), "{tool}");
    }
}

#[test]
fn distance_is_an_enum() {
    assert!(accepts("qdrant_create_collection", json!({"name": "kb", "distance": "dot"})));
    assert!(!accepts("qdrant_create_collection", json!({"name": "kb", "distance": "hamming"})));
}

#[test]
fn destructive_tools_advertise_confirm() {
    let schema = schema_of("qdrant_delete_points");
    assert_eq!(schema["properties"]["confirm"]["type"], json!("boolean"));
    assert_eq!(schema["properties"]["confirm"]["default"], json!(false));
}
