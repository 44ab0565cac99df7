//! logsieve.toml 통합 설정 테스트
//!
//! - logsieve.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use logsieve_core::config::LogsieveConfig;
use logsieve_core::error::{ConfigError, LogsieveError};

const EXAMPLE: &str = include_str!("../../../logsieve.toml.example");

// =============================================================================
// logsieve.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = LogsieveConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = LogsieveConfig::parse(EXAMPLE).expect("should parse");
    let defaults = LogsieveConfig::default();

    assert_eq!(example.general.log_level, defaults.general.log_level);
    assert_eq!(example.general.log_format, defaults.general.log_format);

    let (e, d) = (&example.log_pipeline, &defaults.log_pipeline);
    assert_eq!(e.enabled, d.enabled);
    assert_eq!(e.sources, d.sources);
    assert_eq!(e.log_dir, d.log_dir);
    assert_eq!(e.log_file_name, d.log_file_name);
    assert_eq!(e.daily_file_prefix, d.daily_file_prefix);
    assert_eq!(e.poll_interval_ms, d.poll_interval_ms);
    assert_eq!(e.update_interval_secs, d.update_interval_secs);
    assert_eq!(e.max_log_lines, d.max_log_lines);
    assert_eq!(e.global_blacklist, d.global_blacklist);
    assert_eq!(e.clean_whitespace, d.clean_whitespace);
    assert_eq!(e.merge_label, d.merge_label);
    assert_eq!(e.today_label, d.today_label);
    assert_eq!(e.yesterday_label, d.yesterday_label);
    assert_eq!(e.rule_dir, d.rule_dir);
    assert_eq!(e.state_path, d.state_path);
    assert_eq!(e.trigger_dir, d.trigger_dir);
    assert_eq!(e.verbose_cycles, d.verbose_cycles);

    assert_eq!(example.metrics.enabled, defaults.metrics.enabled);
    assert_eq!(example.metrics.port, defaults.metrics.port);
    assert_eq!(example.metrics.endpoint, defaults.metrics.endpoint);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let config = LogsieveConfig::parse("[general]\nlog_level = \"debug\"\n").expect("should parse");
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.log_pipeline.max_log_lines, 100);
    assert!(!config.metrics.enabled);
}

#[test]
fn partial_config_log_pipeline_only() {
    let toml = r#"
[log_pipeline]
log_file_name = "iobroker.current.log"
global_blacklist = ["heartbeat"]
"#;
    let config = LogsieveConfig::parse(toml).expect("should parse");
    assert_eq!(config.log_pipeline.log_file_name, "iobroker.current.log");
    assert_eq!(config.log_pipeline.global_blacklist, vec!["heartbeat"]);
    assert_eq!(config.log_pipeline.daily_file_prefix, "iobroker.");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn unknown_section_is_ignored() {
    let toml = r#"
[general]
log_level = "warn"

[unknown_section]
foo = "bar"
"#;
    let config = LogsieveConfig::parse(toml).expect("unknown sections should be ignored");
    assert_eq!(config.general.log_level, "warn");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

fn with_env<T>(pairs: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
    let originals: Vec<_> = pairs
        .iter()
        .map(|(k, _)| (k.to_string(), std::env::var(k).ok()))
        .collect();
    // SAFETY: 호출하는 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        for (k, v) in pairs {
            std::env::set_var(k, v);
        }
    }
    let result = f();
    // SAFETY: 테스트 정리
    unsafe {
        for (k, original) in originals {
            match original {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let config = with_env(&[("LOGSIEVE_GENERAL_LOG_LEVEL", "error")], || {
        let mut config =
            LogsieveConfig::parse("[general]\nlog_level = \"info\"\n").expect("should parse");
        config.apply_env_overrides();
        config
    });
    assert_eq!(config.general.log_level, "error");
}

#[test]
#[serial_test::serial]
fn env_override_csv_for_vec_fields() {
    let config = with_env(
        &[("LOGSIEVE_LOG_PIPELINE_GLOBAL_BLACKLIST", "ping, pong ,heartbeat")],
        || {
            let mut config = LogsieveConfig::default();
            config.apply_env_overrides();
            config
        },
    );
    assert_eq!(
        config.log_pipeline.global_blacklist,
        vec!["ping", "pong", "heartbeat"]
    );
}

#[test]
#[serial_test::serial]
fn env_override_bool_and_numeric_fields() {
    let config = with_env(
        &[
            ("LOGSIEVE_LOG_PIPELINE_VERBOSE_CYCLES", "true"),
            ("LOGSIEVE_LOG_PIPELINE_UPDATE_INTERVAL_SECS", "3"),
        ],
        || {
            let mut config = LogsieveConfig::default();
            config.apply_env_overrides();
            config
        },
    );
    assert!(config.log_pipeline.verbose_cycles);
    assert_eq!(config.log_pipeline.update_interval_secs, 3);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_numeric_keeps_toml_value() {
    let config = with_env(&[("LOGSIEVE_LOG_PIPELINE_MAX_LOG_LINES", "lots")], || {
        let mut config =
            LogsieveConfig::parse("[log_pipeline]\nmax_log_lines = 55\n").expect("should parse");
        config.apply_env_overrides();
        config
    });
    assert_eq!(config.log_pipeline.max_log_lines, 55);
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_env_then_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logsieve.toml");
    std::fs::write(&path, EXAMPLE).expect("write config");

    let original = std::env::var("LOGSIEVE_LOG_PIPELINE_MAX_LOG_LINES").ok();
    // SAFETY: serial 테스트
    unsafe { std::env::set_var("LOGSIEVE_LOG_PIPELINE_MAX_LOG_LINES", "0") };
    let result = LogsieveConfig::load(&path).await;
    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSIEVE_LOG_PIPELINE_MAX_LOG_LINES", val),
            None => std::env::remove_var("LOGSIEVE_LOG_PIPELINE_MAX_LOG_LINES"),
        }
    }

    let err = result.expect_err("max_log_lines = 0 must fail validation");
    assert!(matches!(
        err,
        LogsieveError::Config(ConfigError::InvalidValue { .. })
    ));
}

// =============================================================================
// 에러 테스트
// =============================================================================

#[test]
fn malformed_toml_returns_parse_error() {
    let err = LogsieveConfig::parse("[general\nlog_level = ").expect_err("should fail");
    assert!(matches!(
        err,
        LogsieveError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let err = LogsieveConfig::parse("[log_pipeline]\nmax_log_lines = \"many\"\n")
        .expect_err("should fail");
    assert!(matches!(
        err,
        LogsieveError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let err = LogsieveConfig::from_file("/nonexistent/path/logsieve.toml")
        .await
        .expect_err("should fail");
    assert!(matches!(
        err,
        LogsieveError::Config(ConfigError::FileNotFound { .. })
    ));
}
