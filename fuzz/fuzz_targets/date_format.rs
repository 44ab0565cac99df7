#![no_main]

use arbitrary::Arbitrary;
use chrono::DateTime;
use libfuzzer_sys::fuzz_target;

use logsieve_log_pipeline::history::format_date;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    pattern: String,
    ts_secs: i32,
    now_secs: i32,
}

fuzz_target!(|input: FuzzInput| {
    let (Some(ts), Some(now)) = (
        DateTime::from_timestamp(i64::from(input.ts_secs), 0),
        DateTime::from_timestamp(i64::from(input.now_secs), 0),
    ) else {
        return;
    };

    let _ = format_date(
        &input.pattern,
        ts.naive_utc(),
        now.naive_utc(),
        "Today",
        "Yesterday",
    );
});
