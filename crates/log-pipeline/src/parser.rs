//! 라인 파서 -- 정규화된 라인을 {timestamp, level, source, message}로 분해합니다.
//!
//! 하나의 앵커 패턴을 한 번 적용하는 순수 함수입니다.
//! 네 그룹 중 하나라도 없거나 비어 있으면 `None`을 반환합니다.

use chrono::NaiveDateTime;
use regex::Regex;

use logsieve_core::types::{LINE_TIMESTAMP_FORMAT, LINE_TIMESTAMP_WIDTH, LogLevel, ParsedEntry};

use crate::error::LogPipelineError;

/// 로그 라인 패턴
///
/// `2018-07-22 12:45:02.769  - info: javascript.0 Stop script script.js.ScriptAbc`
pub const LINE_PATTERN: &str =
    r"^([0-9_.\-:\s]*?)\s+- (silly|debug|info|warn|error): ([a-z0-9.\-]+)\s(.*)$";

/// 라인 파서
#[derive(Debug, Clone)]
pub struct LineParser {
    pattern: Regex,
}

impl LineParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(LINE_PATTERN)?,
        })
    }

    /// 라인을 파싱합니다.
    pub fn parse(&self, line: &str) -> Option<ParsedEntry> {
        let caps = self.pattern.captures(line)?;
        let timestamp = caps.get(1)?.as_str().trim();
        let level = caps.get(2)?.as_str();
        let source = caps.get(3)?.as_str();
        let message = caps.get(4)?.as_str();

        if timestamp.is_empty() || source.is_empty() || message.is_empty() {
            return None;
        }

        Some(ParsedEntry {
            timestamp: timestamp.to_owned(),
            level: level.parse::<LogLevel>().ok()?,
            source: source.to_owned(),
            message: message.to_owned(),
        })
    }
}

/// 라인 앞 23자를 타임스탬프로 해석합니다.
///
/// 정렬과 clear 마커 비교에 사용합니다.
pub fn timestamp_of(line: &str) -> Option<NaiveDateTime> {
    let head = line.get(..LINE_TIMESTAMP_WIDTH)?;
    NaiveDateTime::parse_from_str(head, LINE_TIMESTAMP_FORMAT).ok()
}
