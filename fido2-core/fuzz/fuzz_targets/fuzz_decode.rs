#![no_main]

//! Fuzz target for fido2_core::decode()
//!
//! Any text that decodes must re-encode to exactly the same text, since the
//! decoder only accepts canonical padded input.
//!
//! Run with: cargo +nightly fuzz run fuzz_decode

use libfuzzer_sys::fuzz_target;
use fido2_core::{decode, encode};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(bytes) = decode(text) {
        assert_eq!(encode(&bytes), text);
    }
});
