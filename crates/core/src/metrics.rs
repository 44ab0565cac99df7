//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 파이프라인은 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logsieve_`
//! - 모듈명: `log_pipeline_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logsieve_core::metrics::LOG_PIPELINE_LINES_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 룰 ID 레이블 키
pub const LABEL_RULE: &str = "rule";

/// 수집 소스 레이블 키 (file, events)
pub const LABEL_SOURCE: &str = "source";

// ─── Log Pipeline 메트릭 ────────────────────────────────────────────

/// 수집된 원시 라인 수 (counter)
pub const LOG_PIPELINE_LINES_RECEIVED_TOTAL: &str = "logsieve_log_pipeline_lines_received_total";

/// 버퍼 오버플로우 또는 정규화로 버려진 라인 수 (counter)
pub const LOG_PIPELINE_LINES_DROPPED_TOTAL: &str = "logsieve_log_pipeline_lines_dropped_total";

/// 파싱 실패 라인 수 (counter)
pub const LOG_PIPELINE_LINES_UNPARSED_TOTAL: &str = "logsieve_log_pipeline_lines_unparsed_total";

/// 룰 매칭 수 (counter, label: rule)
pub const LOG_PIPELINE_LINES_MATCHED_TOTAL: &str = "logsieve_log_pipeline_lines_matched_total";

/// 실행된 처리 주기 수 (counter)
pub const LOG_PIPELINE_CYCLES_TOTAL: &str = "logsieve_log_pipeline_cycles_total";

/// 상태 저장 실패로 발행하지 못한 룰 수 (counter, label: rule)
pub const LOG_PIPELINE_PUBLISH_ERRORS_TOTAL: &str = "logsieve_log_pipeline_publish_errors_total";

/// 대기 버퍼 내 라인 수 (gauge)
pub const LOG_PIPELINE_BUFFER_SIZE: &str = "logsieve_log_pipeline_buffer_size";

/// 처리 주기 소요 시간 (histogram, 초)
pub const LOG_PIPELINE_CYCLE_DURATION_SECONDS: &str =
    "logsieve_log_pipeline_cycle_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logsieve_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "logsieve_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 처리 주기 소요 시간 버킷 (초)
pub const CYCLE_DURATION_BUCKETS: [f64; 10] = [
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 10.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번 호출합니다. 데몬 시작 시점에서 호출됩니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        LOG_PIPELINE_LINES_RECEIVED_TOTAL,
        "Total number of raw log lines received from all sources"
    );
    describe_counter!(
        LOG_PIPELINE_LINES_DROPPED_TOTAL,
        "Total number of lines dropped by buffer overflow or the global blacklist"
    );
    describe_counter!(
        LOG_PIPELINE_LINES_UNPARSED_TOTAL,
        "Total number of normalized lines that did not match the log line format"
    );
    describe_counter!(
        LOG_PIPELINE_LINES_MATCHED_TOTAL,
        "Total number of line assignments to filter rules"
    );
    describe_counter!(
        LOG_PIPELINE_CYCLES_TOTAL,
        "Total number of processing cycles executed"
    );
    describe_counter!(
        LOG_PIPELINE_PUBLISH_ERRORS_TOTAL,
        "Total number of per-rule projections that failed to publish"
    );
    describe_gauge!(
        LOG_PIPELINE_BUFFER_SIZE,
        "Current number of lines waiting for the next cycle"
    );
    describe_histogram!(
        LOG_PIPELINE_CYCLE_DURATION_SECONDS,
        "Time to run one processing cycle in seconds"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "logsieve daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        LOG_PIPELINE_LINES_RECEIVED_TOTAL,
        LOG_PIPELINE_LINES_DROPPED_TOTAL,
        LOG_PIPELINE_LINES_UNPARSED_TOTAL,
        LOG_PIPELINE_LINES_MATCHED_TOTAL,
        LOG_PIPELINE_CYCLES_TOTAL,
        LOG_PIPELINE_PUBLISH_ERRORS_TOTAL,
        LOG_PIPELINE_BUFFER_SIZE,
        LOG_PIPELINE_CYCLE_DURATION_SECONDS,
        DAEMON_UPTIME_SECONDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_logsieve_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("logsieve_"),
                "Metric '{name}' does not start with 'logsieve_' prefix"
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES.iter().filter(|n| n.contains("_lines_")) {
            assert!(name.ends_with("_total"), "counter '{name}' lacks _total");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn cycle_duration_buckets_are_sorted() {
        for pair in CYCLE_DURATION_BUCKETS.windows(2) {
            assert!(pair[1] > pair[0], "Bucket values must be in ascending order");
        }
    }
}
