// SPDX-License-Identifier: MIT OR Apache-2.0
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::io::Write;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("vtb-server").unwrap();
    for var in [
        "QDRANT_URL",
        "QDRANT_API_KEY",
        "MCP_SERVER_PORT",
        "MCP_LOG_LEVEL",
        "DEFAULT_COLLECTION",
        "VTB_DEFAULT_SCOPE",
        "DEBUG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_mentions_the_bridge() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Qdrant"))
        .stdout(predicate::str::contains("--list-tools"));
}

#[test]
fn list_tools_prints_the_catalog() {
    let out = bin().arg("--list-tools").assert().success();
    let tools: Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    let tools = tools.as_array().unwrap();
    assert_eq!(tools.len(), vtb_tools::BUILTIN_TOOL_COUNT);
    assert!(tools.iter().any(|t| t["name"] == "qdrant_upsert_points"));
}

#[test]
fn print_config_applies_flags_and_redacts_secrets() {
    let out = bin()
        .env("QDRANT_API_KEY", "super-secret")
        .args(["--print-config", "--url", "http://vectors:6333", "--port", "9100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret").not());
    let config: Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(config["backend"]["url"], "http://vectors:6333");
    assert_eq!(config["backend"]["api_key"], "***");
    assert_eq!(config["server"]["port"], 9100);
}

#[test]
fn config_file_is_read() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[defaults]\ncollection = \"from_file\"").unwrap();
    let out = bin()
        .arg("--print-config")
        .arg("--config")
        .arg(file.path())
        .assert()
        .success();
    let config: Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(config["defaults"]["collection"], "from_file");
}

#[test]
fn missing_config_file_fails() {
    bin()
        .args(["--config", "/nonexistent/bridge.toml", "--print-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn invalid_env_value_fails() {
    bin()
        .env("MCP_SERVER_PORT", "not-a-port")
        .arg("--print-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MCP_SERVER_PORT"));
}
