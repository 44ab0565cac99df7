#![no_main]

use libfuzzer_sys::fuzz_target;
use logsieve_log_pipeline::{LineNormalizer, LineParser};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(normalizer) = LineNormalizer::new(vec!["heartbeat".to_owned()], true) else {
        return;
    };
    let Ok(parser) = LineParser::new() else {
        return;
    };

    let line = normalizer.normalize(raw);
    if line.is_empty() {
        return;
    }

    // 파싱 성공 시 각 필드는 비어 있지 않아야 함
    if let Some(entry) = parser.parse(&line) {
        assert!(!entry.timestamp.is_empty());
        assert!(!entry.source.is_empty());
        let _ = entry.to_line();
    }
});
