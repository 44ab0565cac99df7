#![no_main]

use libfuzzer_sys::fuzz_target;
use logsieve_log_pipeline::MergeEngine;

fuzz_target!(|lines: Vec<String>| {
    let Ok(engine) = MergeEngine::new("entries") else {
        return;
    };

    let input: Vec<String> = lines.into_iter().take(256).collect();
    let count = input.len();
    let merged = engine.merge(input);

    // 병합은 라인 수를 늘리지 않음
    assert!(merged.len() <= count);
});
