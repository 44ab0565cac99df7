//! 도메인 타입 -- 로그 레벨, 파싱된 엔트리, 구조화 로그 레코드
//!
//! 파이프라인의 모든 단계가 공유하는 값 타입을 정의합니다.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 로그 라인에 포함된 타임스탬프 형식 (`2018-07-22 12:45:02.769`)
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 라인 타임스탬프 고정 폭 (문자 수)
pub const LINE_TIMESTAMP_WIDTH: usize = 23;

/// 로그 레벨
///
/// 텍스트 형식은 소문자(`silly`, `debug`, `info`, `warn`, `error`)입니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 가장 상세한 추적 로그
    Silly,
    /// 디버그
    Debug,
    /// 일반 정보
    #[default]
    Info,
    /// 경고
    Warn,
    /// 에러
    Error,
}

impl LogLevel {
    /// 모든 레벨 (낮은 순)
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Silly,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    /// 소문자 텍스트 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silly => "silly",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 알 수 없는 로그 레벨 문자열
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    /// 소문자 레벨만 허용합니다. 라인 형식이 소문자로 고정되어 있기 때문입니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silly" => Ok(Self::Silly),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(UnknownLogLevel(other.to_owned())),
        }
    }
}

/// 파싱된 로그 엔트리
///
/// 네 필드가 모두 비어 있지 않을 때만 존재합니다.
/// 부분적으로 채워진 엔트리는 만들어지지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// 고정 폭 타임스탬프 문자열 (앞뒤 공백 제거됨)
    pub timestamp: String,
    /// 로그 레벨
    pub level: LogLevel,
    /// 소스 어댑터 인스턴스 (예: `javascript.0`)
    pub source: String,
    /// 메시지 본문
    pub message: String,
}

impl ParsedEntry {
    /// 타임스탬프를 `NaiveDateTime`으로 해석합니다.
    ///
    /// 고정 폭 앞부분만 사용하며, 해석할 수 없으면 `None`을 반환합니다.
    pub fn timestamp_value(&self) -> Option<NaiveDateTime> {
        let head = self.timestamp.get(..LINE_TIMESTAMP_WIDTH)?;
        NaiveDateTime::parse_from_str(head, LINE_TIMESTAMP_FORMAT).ok()
    }

    /// 파서가 다시 읽을 수 있는 한 줄 형식으로 렌더링합니다.
    pub fn to_line(&self) -> String {
        format!(
            "{} - {}: {} {}",
            self.timestamp, self.level, self.source, self.message
        )
    }
}

impl fmt::Display for ParsedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// 구조화 로그 레코드
///
/// 로그 이벤트 구독으로 전달되는 레코드입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 발생 시각 (로컬)
    pub timestamp: NaiveDateTime,
    /// 로그 레벨
    pub level: LogLevel,
    /// 소스 어댑터 인스턴스
    pub source: String,
    /// 메시지 본문
    pub message: String,
}

impl LogRecord {
    /// 로그 파일과 같은 라인 형식으로 렌더링합니다.
    pub fn to_line(&self) -> String {
        format!(
            "{}  - {}: {} {}",
            self.timestamp.format(LINE_TIMESTAMP_FORMAT),
            self.level,
            self.source,
            self.message
        )
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
