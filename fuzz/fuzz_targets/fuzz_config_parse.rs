// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz bridge configuration parsing and validation.
#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = vtb_config::parse_toml(s) else {
        return;
    };
    if let Ok(warnings) = vtb_config::validate_config(&config) {
        for w in &warnings {
            let _ = w.to_string();
        }
    }
    // Redaction never leaks the key.
    if let Some(key) = config.backend.api_key.as_deref()
        && key != "***"
        && !key.is_empty()
    {
        let shown = serde_json::to_string(&config.redacted()).unwrap_or_default();
        assert!(!shown.contains(&format!("\"{key}\"")));
    }
});
