#![no_main]

use libfuzzer_sys::fuzz_target;
use phaseboard_core::filter::FilterState;
use phaseboard_core::validate::parse_snapshot;

fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|b| *b == 0) else {
        return;
    };
    let (query, doc) = data.split_at(split);
    let (Ok(query), Ok(doc)) = (std::str::from_utf8(query), std::str::from_utf8(&doc[1..])) else {
        return;
    };
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(doc) else {
        return;
    };
    let Ok(snapshot) = parse_snapshot(value) else {
        return;
    };

    let filter = FilterState {
        query: query.to_string(),
        ..FilterState::default()
    };
    let once = filter.apply(&snapshot);
    let twice = filter.apply(&once.snapshot);
    assert_eq!(once.snapshot, twice.snapshot);
});
