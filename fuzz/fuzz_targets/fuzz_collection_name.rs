// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz namespace resolution: resolved names stay inside their scope.
#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let (logical, scope) = s.split_once('\n').unwrap_or((s, ""));
    let Ok(physical) = vtb_namespace::resolve(logical, scope) else {
        return;
    };
    assert!(physical.len() <= vtb_namespace::MAX_PHYSICAL_LEN);
    assert_eq!(vtb_namespace::logical_in_scope(&physical, scope), Some(logical));
});
