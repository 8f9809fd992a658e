//! Fuzz target for the rule module outline scanner.
//!
//! Goal: scanning should **never panic** on any input. Malformed modules must come back as
//! parse errors.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_module_outline
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Keep inputs small enough to fuzz quickly.
    if data.len() > 64 * 1024 {
        return;
    }
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = policyguard_repo::fuzz::parse_module_outline(text);
    }
});
