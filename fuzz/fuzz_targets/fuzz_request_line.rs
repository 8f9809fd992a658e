//! Fuzz target for `github.request` line parsing and request building.
//!
//! Goal: building a request should **never panic**, whatever the request line and data.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_request_line
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use policyguard_github::request::{build_request, path_params, split_request_line};
use std::sync::LazyLock;
use url::Url;

static BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://api.github.com/").expect("valid base url"));

/// A request line plus string/number parameters for the data object.
#[derive(Arbitrary, Debug)]
struct RequestInput {
    line: String,
    strings: Vec<(String, String)>,
    numbers: Vec<(String, i64)>,
    flag: Option<(String, bool)>,
}

fuzz_target!(|input: RequestInput| {
    if input.line.len() > 1024 || input.strings.len() + input.numbers.len() > 32 {
        return;
    }

    if let Ok((_, path)) = split_request_line(&input.line) {
        let _ = path_params(path);
    }

    let mut data = serde_json::Map::new();
    for (k, v) in input.strings {
        data.insert(k, serde_json::Value::String(v));
    }
    for (k, v) in input.numbers {
        data.insert(k, serde_json::Value::from(v));
    }
    if let Some((k, v)) = input.flag {
        data.insert(k, serde_json::Value::Bool(v));
    }

    let _ = build_request(&BASE, &input.line, &serde_json::Value::Object(data));
});
