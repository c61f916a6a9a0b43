// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz argument validation against every built-in tool definition.
//!
//! Validation either yields arguments restricted to declared parameters or
//! an `InvalidArgument` error; it never panics.
#![no_main]
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;
use vtb_config::BridgeConfig;
use vtb_error::ErrorKind;
use vtb_tools::{ToolRegistry, builtin_registry, validate};

fn registry() -> &'static ToolRegistry {
    static REGISTRY: OnceLock<ToolRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| builtin_registry(&BridgeConfig::default()).unwrap())
}

fuzz_target!(|data: &[u8]| {
    let Ok(serde_json::Value::Object(args)) = serde_json::from_slice(data) else {
        return;
    };
    for def in registry().definitions() {
        match validate(def, args.clone()) {
            Ok(_) => {
                assert!(args.keys().all(|k| def.get_param(k).is_some()));
            }
            Err(e) => assert_eq!(e.kind, ErrorKind::InvalidArgument),
        }
    }
});
