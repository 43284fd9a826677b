#![no_main]

//! Fuzz target for CeremonyOutcome::from_cbor()
//!
//! Providers hand completions over as raw CBOR. Arbitrary bytes must yield
//! an error, never a panic, and anything accepted must survive re-encoding.
//!
//! Run with: cargo +nightly fuzz run fuzz_completion

use libfuzzer_sys::fuzz_target;
use fido2_core::CeremonyOutcome;

fuzz_target!(|data: &[u8]| {
    if let Ok(outcome) = CeremonyOutcome::from_cbor(data) {
        let bytes = outcome.to_cbor().expect("re-encode accepted outcome");
        assert_eq!(CeremonyOutcome::from_cbor(&bytes).ok(), Some(outcome));
    }
});
