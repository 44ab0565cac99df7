//! 설정 관리 -- logsieve.toml 파싱 및 런타임 설정
//!
//! [`LogsieveConfig`]는 데몬과 CLI가 공유하는 최상위 설정 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSIEVE_LOG_PIPELINE_LOG_DIR=/var/log/iobroker` 형식)
//! 3. 설정 파일 (`logsieve.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logsieve_core::error::LogsieveError> {
//! use logsieve_core::config::LogsieveConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogsieveConfig::load("logsieve.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogsieveConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogsieveError};

/// 지원하는 수집 소스 이름
pub const VALID_SOURCES: &[&str] = &["file", "events"];

/// logsieve 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsieveConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 파이프라인 설정
    #[serde(default)]
    pub log_pipeline: LogPipelineConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogsieveConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogsieveError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogsieveError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogsieveError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogsieveError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogsieveError> {
        toml::from_str(toml_str).map_err(|e| {
            LogsieveError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSIEVE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSIEVE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSIEVE_GENERAL_LOG_FORMAT");

        // Log Pipeline
        let lp = &mut self.log_pipeline;
        override_bool(&mut lp.enabled, "LOGSIEVE_LOG_PIPELINE_ENABLED");
        override_csv(&mut lp.sources, "LOGSIEVE_LOG_PIPELINE_SOURCES");
        override_string(&mut lp.log_dir, "LOGSIEVE_LOG_PIPELINE_LOG_DIR");
        override_string(&mut lp.log_file_name, "LOGSIEVE_LOG_PIPELINE_LOG_FILE_NAME");
        override_string(
            &mut lp.daily_file_prefix,
            "LOGSIEVE_LOG_PIPELINE_DAILY_FILE_PREFIX",
        );
        override_u64(
            &mut lp.poll_interval_ms,
            "LOGSIEVE_LOG_PIPELINE_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut lp.update_interval_secs,
            "LOGSIEVE_LOG_PIPELINE_UPDATE_INTERVAL_SECS",
        );
        override_usize(&mut lp.max_log_lines, "LOGSIEVE_LOG_PIPELINE_MAX_LOG_LINES");
        override_csv(
            &mut lp.global_blacklist,
            "LOGSIEVE_LOG_PIPELINE_GLOBAL_BLACKLIST",
        );
        override_bool(
            &mut lp.clean_whitespace,
            "LOGSIEVE_LOG_PIPELINE_CLEAN_WHITESPACE",
        );
        override_string(&mut lp.merge_label, "LOGSIEVE_LOG_PIPELINE_MERGE_LABEL");
        override_string(&mut lp.today_label, "LOGSIEVE_LOG_PIPELINE_TODAY_LABEL");
        override_string(
            &mut lp.yesterday_label,
            "LOGSIEVE_LOG_PIPELINE_YESTERDAY_LABEL",
        );
        override_string(&mut lp.rule_dir, "LOGSIEVE_LOG_PIPELINE_RULE_DIR");
        override_string(&mut lp.state_path, "LOGSIEVE_LOG_PIPELINE_STATE_PATH");
        override_string(&mut lp.trigger_dir, "LOGSIEVE_LOG_PIPELINE_TRIGGER_DIR");
        override_bool(
            &mut lp.verbose_cycles,
            "LOGSIEVE_LOG_PIPELINE_VERBOSE_CYCLES",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGSIEVE_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGSIEVE_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGSIEVE_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOGSIEVE_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogsieveError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let lp = &self.log_pipeline;
        if lp.enabled {
            if lp.sources.is_empty() {
                return Err(invalid(
                    "log_pipeline.sources",
                    "at least one source is required".to_owned(),
                ));
            }
            for source in &lp.sources {
                if !VALID_SOURCES.contains(&source.as_str()) {
                    return Err(invalid(
                        "log_pipeline.sources",
                        format!(
                            "unknown source '{source}', must be one of: {}",
                            VALID_SOURCES.join(", ")
                        ),
                    ));
                }
            }
            if lp.sources.iter().any(|s| s == "file") && lp.log_dir.is_empty() {
                return Err(invalid(
                    "log_pipeline.log_dir",
                    "must not be empty when the file source is enabled".to_owned(),
                ));
            }
            if lp.poll_interval_ms == 0 || lp.poll_interval_ms > 60_000 {
                return Err(invalid(
                    "log_pipeline.poll_interval_ms",
                    "must be between 1 and 60000".to_owned(),
                ));
            }
            if lp.update_interval_secs == 0 || lp.update_interval_secs > 3600 {
                return Err(invalid(
                    "log_pipeline.update_interval_secs",
                    "must be between 1 and 3600".to_owned(),
                ));
            }
            if lp.max_log_lines == 0 || lp.max_log_lines > 100_000 {
                return Err(invalid(
                    "log_pipeline.max_log_lines",
                    "must be between 1 and 100000".to_owned(),
                ));
            }
            if lp.merge_label.trim().is_empty() {
                return Err(invalid(
                    "log_pipeline.merge_label",
                    "must not be empty".to_owned(),
                ));
            }
            if lp.rule_dir.is_empty() {
                return Err(invalid(
                    "log_pipeline.rule_dir",
                    "must not be empty".to_owned(),
                ));
            }
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must not be 0".to_owned()));
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(invalid(
                    "metrics.endpoint",
                    "must start with '/'".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LogsieveError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogPipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수집 소스 (file, events)
    pub sources: Vec<String>,
    /// 로그 파일 디렉토리
    pub log_dir: String,
    /// 고정 로그 파일 이름. 비어 있으면 일자별 파일을 사용합니다.
    pub log_file_name: String,
    /// 일자별 파일 접두사 (`<prefix>YYYY-MM-DD.log`)
    pub daily_file_prefix: String,
    /// 파일 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 처리 주기 (초)
    pub update_interval_secs: u64,
    /// 룰별 보관 최대 라인 수
    pub max_log_lines: usize,
    /// 전역 블랙리스트 (3자 미만 항목은 무시)
    pub global_blacklist: Vec<String>,
    /// 공백 정리 여부
    pub clean_whitespace: bool,
    /// 병합 카운트 라벨 (`[N <label>]`)
    pub merge_label: String,
    /// 날짜 형식의 `#...#` 구간에 쓰이는 오늘 라벨
    pub today_label: String,
    /// 날짜 형식의 `#...#` 구간에 쓰이는 어제 라벨
    pub yesterday_label: String,
    /// 룰 YAML 디렉토리
    pub rule_dir: String,
    /// 상태 파일 경로
    pub state_path: String,
    /// clear 트리거 디렉토리
    pub trigger_dir: String,
    /// 처리 주기 요약을 info 레벨로 기록
    pub verbose_cycles: bool,
}

impl Default for LogPipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: vec!["file".to_owned()],
            log_dir: "/opt/iobroker/log".to_owned(),
            log_file_name: String::new(),
            daily_file_prefix: "iobroker.".to_owned(),
            poll_interval_ms: 1000,
            update_interval_secs: 20,
            max_log_lines: 100,
            global_blacklist: Vec::new(),
            clean_whitespace: true,
            merge_label: "entries".to_owned(),
            today_label: "Today".to_owned(),
            yesterday_label: "Yesterday".to_owned(),
            rule_dir: "/etc/logsieve/rules".to_owned(),
            state_path: "/var/lib/logsieve/state.json".to_owned(),
            trigger_dir: "/var/lib/logsieve/triggers".to_owned(),
            verbose_cycles: false,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 익스포터 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
