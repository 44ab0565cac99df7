//! 라인 정규화 -- 원시 로그 라인을 파서 입력 형태로 정리합니다.
//!
//! 순서:
//! 1. ANSI 색상 이스케이프 제거
//! 2. 선두 `undefined` 제거
//! 3. 공백 정리 (설정 시)
//! 4. 전역 블랙리스트 검사 (일치하면 빈 문자열)
//!
//! 빈 문자열은 "버림" 신호이며, 정규화는 실패하지 않습니다.

use regex::Regex;

use crate::error::LogPipelineError;
use crate::rule::matcher::{MatchMode, contains_terms};

/// ANSI SGR 이스케이프 (`ESC[ ... m`)
const ANSI_ESCAPE_PATTERN: &str = r"\x1b\[.*?m";

/// 일부 로그 라인 앞에 붙는 잔여 문자열
const UNDEFINED_PREFIX: &str = "undefined";

/// 라인 정규화기
pub struct LineNormalizer {
    ansi: Regex,
    global_blacklist: Vec<String>,
    clean_whitespace: bool,
}

impl LineNormalizer {
    /// 새 정규화기를 생성합니다.
    pub fn new(
        global_blacklist: Vec<String>,
        clean_whitespace: bool,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            ansi: Regex::new(ANSI_ESCAPE_PATTERN)?,
            global_blacklist,
            clean_whitespace,
        })
    }

    /// 원시 라인을 정규화합니다. 버려야 하는 라인은 빈 문자열을 반환합니다.
    pub fn normalize(&self, raw: &str) -> String {
        let stripped = self.ansi.replace_all(raw, "");
        let stripped = stripped
            .strip_prefix(UNDEFINED_PREFIX)
            .unwrap_or(&stripped);

        let line = if self.clean_whitespace {
            stripped.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            stripped.trim_end_matches(['\r', '\n']).to_owned()
        };

        if contains_terms(&line, &self.global_blacklist, MatchMode::Blacklist) {
            return String::new();
        }
        line
    }
}
