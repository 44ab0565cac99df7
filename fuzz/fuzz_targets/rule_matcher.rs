#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logsieve_log_pipeline::rule::{FilterEngine, FilterRule};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    filter_all: Vec<String>,
    filter_any: Vec<String>,
    blacklist: Vec<String>,
    clean: Vec<String>,
    line: String,
}

fuzz_target!(|input: FuzzInput| {
    // 용어 수 제한 (성능)
    let mut rule = FilterRule::new("fuzz");
    rule.filter_all = input.filter_all.into_iter().take(8).collect();
    rule.filter_any = input.filter_any.into_iter().take(8).collect();
    rule.blacklist = input.blacklist.into_iter().take(8).collect();
    rule.clean = input.clean.into_iter().take(8).collect();

    let mut engine = FilterEngine::new();
    if engine.add_rule(rule).is_err() {
        return;
    }
    let Some(rule) = engine.rule("fuzz") else {
        return;
    };

    if engine.matches(rule, &input.line) {
        let cleaned = engine.clean_line(rule, &input.line);
        assert!(cleaned.len() <= input.line.len());
    }
});
