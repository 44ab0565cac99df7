//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogsieveError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use logsieve_core::error::{LogsieveError, PipelineError, StateError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 룰 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 룰 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 룰 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 룰 ID
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 등록되지 않은 룰 ID
    #[error("unknown rule: {0}")]
    UnknownRule(String),

    /// 수집기 에러 (파일 I/O 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (file, events)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 상태 저장소 에러
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for LogsieveError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::State(e) => LogsieveError::State(e),
            LogPipelineError::Io(e) => LogsieveError::Io(e),
            other => LogsieveError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_load_error_display() {
        let err = LogPipelineError::RuleLoad {
            path: "/etc/logsieve/rules/error.yml".to_owned(),
            reason: "invalid YAML".to_owned(),
        };
        assert!(err.to_string().contains("error.yml"));
    }

    #[test]
    fn rule_validation_error_names_rule() {
        let err = LogPipelineError::RuleValidation {
            rule_id: "alexa".to_owned(),
            reason: "bad clean token".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("alexa"));
        assert!(msg.contains("bad clean token"));
    }

    #[test]
    fn converts_to_logsieve_error() {
        let err = LogPipelineError::Channel("receiver closed".to_owned());
        let top: LogsieveError = err.into();
        assert!(matches!(top, LogsieveError::Pipeline(_)));
    }

    #[test]
    fn state_error_keeps_its_kind() {
        let err = LogPipelineError::State(StateError::Read {
            key: "all.log".to_owned(),
            reason: "gone".to_owned(),
        });
        let top: LogsieveError = err.into();
        assert!(matches!(top, LogsieveError::State(_)));
    }
}
