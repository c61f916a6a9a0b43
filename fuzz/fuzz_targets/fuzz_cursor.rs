// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz cursor decoding: arbitrary tokens are rejected, never trusted.
#![no_main]
use libfuzzer_sys::fuzz_target;
use vtb_translate::{CursorPosition, CursorScope, decode_cursor, encode_cursor};

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };
    let scope = CursorScope {
        collection: "kb-fuzz",
        filter: None,
        query: "scroll",
    };

    // A position that decodes survives a fresh encode/decode cycle.
    if let Ok(position) = decode_cursor(token, &scope) {
        let again = encode_cursor(&scope, &position);
        let back: CursorPosition = decode_cursor(&again, &scope).unwrap();
        assert_eq!(back, position);
    }
});
