//! 용어 매칭 로직 -- all/any/blacklist 평가 및 clean 정규식 캐싱
//!
//! [`contains_terms`]는 세 가지 모드의 부분 문자열 판정을 수행합니다.
//! [`TermMatcher`]는 룰의 정규식 `clean` 토큰을 로딩 시 한 번만 컴파일하여 캐싱합니다.

use std::collections::HashMap;

use regex::Regex;

use super::types::{CleanToken, FilterRule};
use crate::error::LogPipelineError;

/// 블랙리스트 용어 최소 길이
pub const MIN_BLACKLIST_TERM_LEN: usize = 3;

/// 용어 매칭 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// 비어 있지 않은 모든 용어 포함. 유효 용어가 없으면 true.
    All,
    /// 비어 있지 않은 용어 중 하나 이상 포함. 유효 용어가 없으면 true.
    Any,
    /// 3자 이상 용어 중 하나라도 포함되면 true. 유효 용어가 없으면 false.
    Blacklist,
}

/// 입력 문자열이 용어 목록을 모드에 따라 포함하는지 판정합니다.
///
/// 빈 필터 필드는 "제약 없음"을 뜻하므로 `All`/`Any`는 통과,
/// `Blacklist`는 차단하지 않습니다.
pub fn contains_terms<S: AsRef<str>>(input: &str, terms: &[S], mode: MatchMode) -> bool {
    match mode {
        MatchMode::All => terms
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| !t.is_empty())
            .all(|t| input.contains(t)),
        MatchMode::Any => {
            let mut effective = terms.iter().map(AsRef::as_ref).filter(|t| !t.is_empty());
            match effective.next() {
                None => true,
                Some(first) => input.contains(first) || effective.any(|t| input.contains(t)),
            }
        }
        MatchMode::Blacklist => terms
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| t.chars().count() >= MIN_BLACKLIST_TERM_LEN)
            .any(|t| input.contains(t)),
    }
}

/// 룰 매처 -- 필터 판정 및 clean 정규식 캐싱
pub struct TermMatcher {
    /// 컴파일된 정규식 캐시: (rule_id, clean_index) -> Regex
    regex_cache: HashMap<(String, usize), Regex>,
}

impl TermMatcher {
    /// 새 매처를 생성합니다.
    pub fn new() -> Self {
        Self {
            regex_cache: HashMap::new(),
        }
    }

    /// 룰의 정규식 clean 토큰을 미리 컴파일합니다.
    pub fn compile_rule(&mut self, rule: &FilterRule) -> Result<(), LogPipelineError> {
        for (idx, raw) in rule.clean.iter().enumerate() {
            if let CleanToken::Pattern(pattern) = CleanToken::from_raw(raw) {
                let regex = Regex::new(pattern).map_err(|e| LogPipelineError::RuleValidation {
                    rule_id: rule.id.clone(),
                    reason: format!("invalid regex in clean[{idx}]: {e}"),
                })?;
                self.regex_cache.insert((rule.id.clone(), idx), regex);
            }
        }
        Ok(())
    }

    /// 라인이 룰에 배정되는지 판정합니다.
    ///
    /// `all(filter_all) && any(filter_any) && !blacklist(blacklist)`
    pub fn matches(&self, rule: &FilterRule, line: &str) -> bool {
        contains_terms(line, &rule.filter_all, MatchMode::All)
            && contains_terms(line, &rule.filter_any, MatchMode::Any)
            && !contains_terms(line, &rule.blacklist, MatchMode::Blacklist)
    }

    /// 룰의 clean 토큰을 순서대로 적용합니다.
    ///
    /// 리터럴은 첫 번째 등장만, 정규식은 첫 번째 매치만 제거합니다.
    pub fn clean_line(&self, rule: &FilterRule, line: &str) -> String {
        let mut out = line.to_owned();
        for (idx, raw) in rule.clean.iter().enumerate() {
            if raw.is_empty() {
                continue;
            }
            match CleanToken::from_raw(raw) {
                CleanToken::Literal(token) => {
                    if out.contains(token) {
                        out = out.replacen(token, "", 1);
                    }
                }
                CleanToken::Pattern(_) => {
                    let Some(regex) = self.regex_cache.get(&(rule.id.clone(), idx)) else {
                        tracing::debug!(rule_id = %rule.id, idx, "clean regex not compiled");
                        continue;
                    };
                    out = regex.replacen(&out, 1, "").into_owned();
                }
            }
        }
        out
    }
}

impl Default for TermMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "2018-07-22 12:45:02.769 - info: javascript.0 Stop script script.js.ScriptAbc";

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn all_requires_every_term() {
        assert!(contains_terms(LINE, &terms(&["info", "Stop"]), MatchMode::All));
        assert!(!contains_terms(LINE, &terms(&["info", "Start"]), MatchMode::All));
    }

    #[test]
    fn all_ignores_empty_terms() {
        assert!(contains_terms(LINE, &terms(&["", "info", ""]), MatchMode::All));
        assert!(contains_terms(LINE, &terms(&["", ""]), MatchMode::All));
        assert!(contains_terms::<String>(LINE, &[], MatchMode::All));
    }

    #[test]
    fn any_requires_one_term() {
        assert!(contains_terms(LINE, &terms(&["Start", "Stop"]), MatchMode::Any));
        assert!(!contains_terms(LINE, &terms(&["Start", "Run"]), MatchMode::Any));
    }

    #[test]
    fn any_with_no_effective_terms_passes() {
        assert!(contains_terms(LINE, &terms(&["", ""]), MatchMode::Any));
        assert!(contains_terms::<String>(LINE, &[], MatchMode::Any));
    }

    #[test]
    fn blacklist_ignores_short_terms() {
        assert!(!contains_terms(LINE, &terms(&["in", "js", ""]), MatchMode::Blacklist));
        assert!(contains_terms(LINE, &terms(&["in", "Stop"]), MatchMode::Blacklist));
    }

    #[test]
    fn blacklist_with_no_effective_terms_never_blocks() {
        assert!(!contains_terms::<String>(LINE, &[], MatchMode::Blacklist));
    }

    #[test]
    fn matches_combines_all_any_blacklist() {
        let matcher = TermMatcher::new();
        let mut rule = FilterRule::new("info");
        rule.filter_all = terms(&[" - info: "]);
        assert!(matcher.matches(&rule, LINE));

        rule.filter_any = terms(&["adapter", "script"]);
        assert!(matcher.matches(&rule, LINE));

        rule.blacklist = terms(&["ScriptAbc"]);
        assert!(!matcher.matches(&rule, LINE));
    }

    #[test]
    fn empty_rule_matches_everything() {
        let matcher = TermMatcher::new();
        let rule = FilterRule::new("all");
        assert!(matcher.matches(&rule, LINE));
        assert!(matcher.matches(&rule, "anything"));
    }

    #[test]
    fn clean_removes_first_literal_occurrence() {
        let matcher = TermMatcher::new();
        let mut rule = FilterRule::new("r");
        rule.clean = terms(&["script", ""]);
        assert_eq!(
            matcher.clean_line(&rule, LINE),
            "2018-07-22 12:45:02.769 - info: java.0 Stop script script.js.ScriptAbc"
        );
    }

    #[test]
    fn clean_applies_tokens_in_order() {
        let matcher = TermMatcher::new();
        let mut rule = FilterRule::new("r");
        rule.clean = terms(&["Stop ", "script "]);
        assert_eq!(
            matcher.clean_line(&rule, LINE),
            "2018-07-22 12:45:02.769 - info: javascript.0 script.js.ScriptAbc"
        );
    }

    #[test]
    fn clean_regex_token_removes_first_match() {
        let mut matcher = TermMatcher::new();
        let mut rule = FilterRule::new("alexa");
        rule.clean = terms(&[r"/script\.js\.[^:]*: \[Alexa-Log-Script]/"]);
        matcher.compile_rule(&rule).unwrap();
        let line = "2024-01-05 08:00:00.000 - info: javascript.0 script.js.Alexa: [Alexa-Log-Script] Licht an";
        assert_eq!(
            matcher.clean_line(&rule, line),
            "2024-01-05 08:00:00.000 - info: javascript.0  Licht an"
        );
    }

    #[test]
    fn invalid_clean_regex_rejects_rule() {
        let mut matcher = TermMatcher::new();
        let mut rule = FilterRule::new("bad");
        rule.clean = terms(&["/[unclosed/"]);
        assert!(matcher.compile_rule(&rule).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn empty_filters_match_any_line(line in "\\PC{0,120}") {
                let matcher = TermMatcher::new();
                prop_assert!(matcher.matches(&FilterRule::new("all"), &line));
            }

            #[test]
            fn short_blacklist_terms_never_block(line in "\\PC{0,120}", term in "[a-z]{0,2}") {
                prop_assert!(!contains_terms(&line, &[term], MatchMode::Blacklist));
            }
        }
    }
}
