//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogPipelineConfig`](logsieve_core::config::LogPipelineConfig)를
//! 기반으로 로그 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logsieve_core::config::LogsieveConfig;
//! use logsieve_log_pipeline::config::PipelineConfig;
//!
//! let core_config = LogsieveConfig::default();
//! let config = PipelineConfig::from_core(&core_config.log_pipeline);
//! ```

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 버퍼 오버플로우 시 드롭 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropPolicy {
    /// 가장 오래된 라인을 드롭 (기본값)
    #[default]
    Oldest,
    /// 새로 들어온 라인을 거부
    Newest,
}

/// 로그 파이프라인 설정
///
/// core의 `LogPipelineConfig`에서 파생되며, 파이프라인 내부에서
/// 사용하는 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수집 소스 목록 (file, events)
    pub sources: Vec<String>,
    /// 로그 파일 디렉토리
    pub log_dir: String,
    /// 고정 로그 파일 이름 (비어 있으면 일자별 파일)
    pub log_file_name: String,
    /// 일자별 파일 접두사
    pub daily_file_prefix: String,
    /// 파일 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 처리 주기 (초)
    pub update_interval_secs: u64,
    /// 룰별 보관 최대 라인 수
    pub max_log_lines: usize,
    /// 전역 블랙리스트
    pub global_blacklist: Vec<String>,
    /// 공백 정리 여부
    pub clean_whitespace: bool,
    /// 병합 카운트 라벨
    pub merge_label: String,
    /// 오늘 라벨
    pub today_label: String,
    /// 어제 라벨
    pub yesterday_label: String,
    /// 룰 YAML 디렉토리
    pub rule_dir: String,
    /// 상태 파일 경로
    pub state_path: String,
    /// clear 트리거 디렉토리 (비어 있으면 감시하지 않음)
    pub trigger_dir: String,
    /// 처리 주기 요약을 info 레벨로 기록
    pub verbose_cycles: bool,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 수집기 -> 처리 태스크 채널 및 대기 버퍼 용량
    pub buffer_capacity: usize,
    /// 버퍼 오버플로우 드롭 정책
    pub drop_policy: DropPolicy,
    /// 파일 열기/읽기 연속 실패 허용 횟수
    pub max_open_retries: u32,
    /// 재시도 간격 (초)
    pub retry_delay_secs: u64,
    /// 발행 알림 채널 용량
    pub publication_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&logsieve_core::config::LogPipelineConfig::default())
    }
}

impl PipelineConfig {
    /// core의 `LogPipelineConfig`에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &logsieve_core::config::LogPipelineConfig) -> Self {
        Self {
            enabled: core.enabled,
            sources: core.sources.clone(),
            log_dir: core.log_dir.clone(),
            log_file_name: core.log_file_name.clone(),
            daily_file_prefix: core.daily_file_prefix.clone(),
            poll_interval_ms: core.poll_interval_ms,
            update_interval_secs: core.update_interval_secs,
            max_log_lines: core.max_log_lines,
            global_blacklist: core.global_blacklist.clone(),
            clean_whitespace: core.clean_whitespace,
            merge_label: core.merge_label.clone(),
            today_label: core.today_label.clone(),
            yesterday_label: core.yesterday_label.clone(),
            rule_dir: core.rule_dir.clone(),
            state_path: core.state_path.clone(),
            trigger_dir: core.trigger_dir.clone(),
            verbose_cycles: core.verbose_cycles,
            buffer_capacity: 10_000,
            drop_policy: DropPolicy::Oldest,
            max_open_retries: 5,
            retry_delay_secs: 5,
            publication_capacity: 256,
        }
    }

    /// 파일 소스가 활성화되어 있는지 확인합니다.
    pub fn file_source_enabled(&self) -> bool {
        self.sources.iter().any(|s| s == "file")
    }

    /// 구조화 레코드 소스가 활성화되어 있는지 확인합니다.
    pub fn event_source_enabled(&self) -> bool {
        self.sources.iter().any(|s| s == "events")
    }

    /// 디렉토리 경로에 `..` 컴포넌트가 없는지 검증합니다.
    fn validate_dir(field: &str, path_str: &str) -> Result<(), LogPipelineError> {
        if Path::new(path_str)
            .components()
            .any(|c| c == Component::ParentDir)
        {
            return Err(LogPipelineError::Config {
                field: field.to_owned(),
                reason: format!("path '{path_str}' contains path traversal pattern '..'"),
            });
        }
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_BUFFER_CAPACITY: usize = 10_000_000;
        const MAX_UPDATE_INTERVAL_SECS: u64 = 3600;
        const MAX_LOG_LINES: usize = 100_000;

        if self.buffer_capacity == 0 || self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(LogPipelineError::Config {
                field: "buffer_capacity".to_owned(),
                reason: format!("must be 1-{MAX_BUFFER_CAPACITY}"),
            });
        }

        if self.update_interval_secs == 0 || self.update_interval_secs > MAX_UPDATE_INTERVAL_SECS
        {
            return Err(LogPipelineError::Config {
                field: "update_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_UPDATE_INTERVAL_SECS}"),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(LogPipelineError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_log_lines == 0 || self.max_log_lines > MAX_LOG_LINES {
            return Err(LogPipelineError::Config {
                field: "max_log_lines".to_owned(),
                reason: format!("must be 1-{MAX_LOG_LINES}"),
            });
        }

        if self.merge_label.trim().is_empty() {
            return Err(LogPipelineError::Config {
                field: "merge_label".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.max_open_retries == 0 {
            return Err(LogPipelineError::Config {
                field: "max_open_retries".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.publication_capacity == 0 {
            return Err(LogPipelineError::Config {
                field: "publication_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.enabled && self.sources.is_empty() {
            return Err(LogPipelineError::Config {
                field: "sources".to_owned(),
                reason: "at least one source must be configured when enabled".to_owned(),
            });
        }

        if self.file_source_enabled() && self.log_dir.is_empty() {
            return Err(LogPipelineError::Config {
                field: "log_dir".to_owned(),
                reason: "must not be empty when the file source is enabled".to_owned(),
            });
        }

        if self.log_file_name.contains('/') || self.log_file_name.contains('\\') {
            return Err(LogPipelineError::Config {
                field: "log_file_name".to_owned(),
                reason: "must be a bare file name".to_owned(),
            });
        }

        Self::validate_dir("log_dir", &self.log_dir)?;
        Self::validate_dir("rule_dir", &self.rule_dir)?;
        Self::validate_dir("trigger_dir", &self.trigger_dir)?;

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 수집 소스를 설정합니다.
    pub fn sources(mut self, sources: Vec<String>) -> Self {
        self.config.sources = sources;
        self
    }

    /// 로그 디렉토리를 설정합니다.
    pub fn log_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    /// 고정 로그 파일 이름을 설정합니다.
    pub fn log_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.log_file_name = name.into();
        self
    }

    /// 파일 폴링 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 처리 주기(초)를 설정합니다.
    pub fn update_interval_secs(mut self, secs: u64) -> Self {
        self.config.update_interval_secs = secs;
        self
    }

    /// 룰별 최대 보관 라인 수를 설정합니다.
    pub fn max_log_lines(mut self, lines: usize) -> Self {
        self.config.max_log_lines = lines;
        self
    }

    /// 전역 블랙리스트를 설정합니다.
    pub fn global_blacklist(mut self, terms: Vec<String>) -> Self {
        self.config.global_blacklist = terms;
        self
    }

    /// 병합 라벨을 설정합니다.
    pub fn merge_label(mut self, label: impl Into<String>) -> Self {
        self.config.merge_label = label.into();
        self
    }

    /// 룰 디렉토리를 설정합니다.
    pub fn rule_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.rule_dir = dir.into();
        self
    }

    /// 트리거 디렉토리를 설정합니다.
    pub fn trigger_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.trigger_dir = dir.into();
        self
    }

    /// 버퍼 용량을 설정합니다.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// 드롭 정책을 설정합니다.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.config.drop_policy = policy;
        self
    }

    /// 재시도 정책을 설정합니다.
    pub fn retry(mut self, max_open_retries: u32, retry_delay_secs: u64) -> Self {
        self.config.max_open_retries = max_open_retries;
        self.config.retry_delay_secs = retry_delay_secs;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
