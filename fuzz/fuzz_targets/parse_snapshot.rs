#![no_main]

use libfuzzer_sys::fuzz_target;
use phaseboard_core::validate::{check_shape, parse_snapshot};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(document) = serde_yaml::from_str::<serde_yaml::Value>(text) else {
        return;
    };
    let violations = check_shape(&document);
    let parsed = parse_snapshot(document);
    if !violations.is_empty() {
        assert!(parsed.is_err());
    }
});
