// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz filter decoding, translation and in-memory evaluation.
//!
//! Input is a JSON object `{"filter": ..., "payload": {...}}`. Decoding may
//! fail; anything that decodes must translate or fail with a typed error,
//! and must evaluate against any payload without panicking.
#![no_main]
use libfuzzer_sys::fuzz_target;
use vtb_core::FilterExpression;

fuzz_target!(|data: &[u8]| {
    let Ok(val) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Some(raw) = val.get("filter") else {
        return;
    };
    let Ok(filter) = serde_json::from_value::<FilterExpression>(raw.clone()) else {
        return;
    };

    if let Ok(wire) = vtb_translate::to_backend_filter(&filter) {
        assert!(wire.is_object());
    }

    if let Some(payload) = val.get("payload").and_then(|p| p.as_object()) {
        let _ = filter.matches(payload);
    }
});
