//! 필터 룰 엔진 -- YAML 기반 라인 분류
//!
//! 사용자 정의 룰을 로드하여 정규화된 라인을 룰별 버퍼에 배정합니다.
//! 하나의 라인은 0개, 1개 또는 여러 룰에 배정될 수 있습니다.
//!
//! # 룰 형식
//! ```yaml
//! id: warn
//! filter_all: [" - warn: "]
//! filter_any: []
//! blacklist: ["heartbeat"]
//! clean: ["script.js."]
//! merge: true
//! ```
//!
//! # 아키텍처
//! - [`FilterEngine`]: 룰 관리 및 배정 코디네이터
//! - [`RuleBuffers`]: 처리 주기마다 새로 만드는 룰별 라인 버퍼
//! - [`loader`]: YAML 파일 로딩 및 유효성 검증
//! - [`matcher`]: all/any/blacklist 판정과 clean 적용
//! - [`types`]: 룰 데이터 구조 정의

pub mod loader;
pub mod matcher;
pub mod types;

pub use loader::RuleLoader;
pub use matcher::{MatchMode, TermMatcher, contains_terms};
pub use types::{CleanToken, FilterRule, JsonColumn};

use std::collections::HashMap;

use crate::error::LogPipelineError;

/// 필터 엔진 -- 룰 관리 및 라인 배정
///
/// 룰은 로드 순서를 유지하며, ID로 조회할 수 있는 인덱스를 함께 보관합니다.
///
/// # 사용 예시
/// ```ignore
/// let mut engine = FilterEngine::new();
/// engine.load_rules_from_dir("/etc/logsieve/rules").await?;
///
/// let mut buffers = RuleBuffers::new();
/// engine.assign(line, &mut buffers);
/// ```
pub struct FilterEngine {
    /// 룰 목록 (로드 순서)
    rules: Vec<FilterRule>,
    /// ID -> `rules` 인덱스
    index: HashMap<String, usize>,
    /// 컴파일된 매처
    matcher: TermMatcher,
}

impl FilterEngine {
    /// 빈 엔진을 생성합니다.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            index: HashMap::new(),
            matcher: TermMatcher::new(),
        }
    }

    /// 룰 목록으로 엔진을 생성합니다.
    pub fn from_rules(rules: Vec<FilterRule>) -> Result<Self, LogPipelineError> {
        let mut engine = Self::new();
        for rule in rules {
            engine.add_rule(rule)?;
        }
        Ok(engine)
    }

    /// 디렉토리에서 YAML 룰 파일을 로드합니다.
    ///
    /// 정규식 컴파일에 실패한 룰은 경고를 남기고 건너뜁니다.
    pub async fn load_rules_from_dir(
        &mut self,
        dir: impl AsRef<std::path::Path>,
    ) -> Result<usize, LogPipelineError> {
        let rules = RuleLoader::load_directory(dir).await?;
        let mut count = 0;
        for rule in rules {
            let id = rule.id.clone();
            match self.add_rule(rule) {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!(rule_id = %id, error = %e, "rule rejected, skipping"),
            }
        }
        Ok(count)
    }

    /// 단일 룰을 추가합니다.
    pub fn add_rule(&mut self, mut rule: FilterRule) -> Result<(), LogPipelineError> {
        rule.validate()?;
        rule.dedup_json_columns();
        if self.index.contains_key(&rule.id) {
            return Err(LogPipelineError::RuleValidation {
                rule_id: rule.id.clone(),
                reason: "duplicate rule id".to_owned(),
            });
        }
        self.matcher.compile_rule(&rule)?;
        self.index.insert(rule.id.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// ID로 룰을 조회합니다.
    pub fn rule(&self, rule_id: &str) -> Option<&FilterRule> {
        self.index.get(rule_id).and_then(|&i| self.rules.get(i))
    }

    /// 로드 순서대로 룰을 반환합니다.
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// 현재 로드된 룰 수를 반환합니다.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 라인이 룰에 배정되는지 판정합니다.
    pub fn matches(&self, rule: &FilterRule, line: &str) -> bool {
        self.matcher.matches(rule, line)
    }

    /// 라인을 매칭되는 모든 룰의 버퍼에 추가합니다.
    ///
    /// 배정된 룰 수를 반환합니다.
    pub fn assign(&self, line: &str, buffers: &mut RuleBuffers) -> usize {
        let mut assigned = 0;
        for rule in &self.rules {
            if self.matcher.matches(rule, line) {
                buffers.push(&rule.id, line);
                assigned += 1;
            }
        }
        assigned
    }

    /// 라인이 매칭되는 룰 ID 목록을 반환합니다.
    pub fn matching_rules(&self, line: &str) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| self.matcher.matches(r, line))
            .map(|r| r.id.as_str())
            .collect()
    }

    /// 룰의 clean 토큰을 라인에 적용합니다.
    pub fn clean_line(&self, rule: &FilterRule, line: &str) -> String {
        self.matcher.clean_line(rule, line)
    }

    /// 룰 버퍼를 꺼내 clean을 적용한 라인 목록을 반환합니다.
    pub fn take_cleaned(&self, rule: &FilterRule, buffers: &mut RuleBuffers) -> Vec<String> {
        buffers
            .take(&rule.id)
            .into_iter()
            .map(|line| self.matcher.clean_line(rule, &line))
            .collect()
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 처리 주기별 룰 버퍼
///
/// 룰 ID -> 추가 전용 라인 목록. 주기마다 새로 생성합니다.
#[derive(Debug, Default)]
pub struct RuleBuffers {
    lines: HashMap<String, Vec<String>>,
}

impl RuleBuffers {
    /// 빈 버퍼를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 룰 버퍼에 라인을 추가합니다.
    pub fn push(&mut self, rule_id: &str, line: &str) {
        self.lines
            .entry(rule_id.to_owned())
            .or_default()
            .push(line.to_owned());
    }

    /// 룰 버퍼를 꺼냅니다. 없으면 빈 목록입니다.
    pub fn take(&mut self, rule_id: &str) -> Vec<String> {
        self.lines.remove(rule_id).unwrap_or_default()
    }

    /// 룰 버퍼를 조회합니다.
    pub fn get(&self, rule_id: &str) -> &[String] {
        self.lines.get(rule_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 라인이 배정된 룰 수
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 배정된 라인이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 모든 룰에 배정된 라인 수의 합
    pub fn total_lines(&self) -> usize {
        self.lines.values().map(Vec::len).sum()
    }
}
