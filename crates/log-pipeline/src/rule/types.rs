//! 필터 룰 데이터 타입
//!
//! YAML 룰 파일에서 역직렬화되는 구조체들을 정의합니다.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::LogPipelineError;

/// 룰 ID 최대 길이
pub const MAX_RULE_ID_LEN: usize = 256;

/// 필터 룰 -- 하나의 YAML 룰 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// id: alexa
/// filter_all: ["[Alexa-Log-Script]"]
/// filter_any: []
/// blacklist: ["test"]
/// clean:
///   - '/script\.js\.[^:]*: \[Alexa-Log-Script]/'
/// merge: false
/// sort_descending: true
/// json_columns: [date, msg]
/// json_date_format: "#DD.MM.# hh:mm"
/// json_log_length: 100
/// json_max_lines: 60
/// json_css_to_level: true
/// ```
///
/// camelCase 키(`sortDescending`, `jsonColumns` 등)도 허용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// 룰 고유 ID (`[A-Za-z0-9_-]`)
    pub id: String,
    /// 모두 포함되어야 하는 용어 (AND)
    #[serde(default, alias = "filterAll")]
    pub filter_all: Vec<String>,
    /// 하나 이상 포함되어야 하는 용어 (OR)
    #[serde(default, alias = "filterAny")]
    pub filter_any: Vec<String>,
    /// 포함되면 제외되는 용어 (3자 이상만 유효)
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// 매칭된 라인에서 제거할 토큰. `/pattern/` 형식은 정규식입니다.
    #[serde(default)]
    pub clean: Vec<String>,
    /// 동일 메시지 병합 여부
    #[serde(default)]
    pub merge: bool,
    /// 최신 항목이 위로 오도록 정렬
    #[serde(default = "default_true", alias = "sortDescending")]
    pub sort_descending: bool,
    /// JSON 출력 컬럼 (순서 유지). 알 수 없는 이름은 경고 후 무시합니다.
    #[serde(
        default = "default_json_columns",
        alias = "jsonColumns",
        deserialize_with = "lenient_json_columns"
    )]
    pub json_columns: Vec<JsonColumn>,
    /// JSON `date` 컬럼 형식
    #[serde(default = "default_json_date_format", alias = "jsonDateFormat")]
    pub json_date_format: String,
    /// JSON `msg` 컬럼 최대 문자 수
    #[serde(default = "default_json_log_length", alias = "jsonLogLength")]
    pub json_log_length: usize,
    /// JSON 최대 행 수
    #[serde(default = "default_json_max_lines", alias = "jsonMaxLines")]
    pub json_max_lines: usize,
    /// 스타일 마커를 `level` 컬럼에만 적용
    #[serde(default = "default_true", alias = "jsonCssToLevel")]
    pub json_css_to_level: bool,
}

fn default_true() -> bool {
    true
}

fn default_json_columns() -> Vec<JsonColumn> {
    JsonColumn::ALL.to_vec()
}

fn lenient_json_columns<'de, D>(deserializer: D) -> Result<Vec<JsonColumn>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(names
        .iter()
        .filter_map(|name| {
            let column = JsonColumn::from_name(name);
            if column.is_none() {
                tracing::warn!(column = %name, "ignoring unknown json column");
            }
            column
        })
        .collect())
}

fn default_json_date_format() -> String {
    "hh:mm:ss".to_owned()
}

fn default_json_log_length() -> usize {
    100
}

fn default_json_max_lines() -> usize {
    60
}

impl FilterRule {
    /// 기본값으로 채운 룰을 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filter_all: Vec::new(),
            filter_any: Vec::new(),
            blacklist: Vec::new(),
            clean: Vec::new(),
            merge: false,
            sort_descending: true,
            json_columns: default_json_columns(),
            json_date_format: default_json_date_format(),
            json_log_length: default_json_log_length(),
            json_max_lines: default_json_max_lines(),
            json_css_to_level: true,
        }
    }

    /// 중복된 JSON 컬럼을 경고와 함께 제거합니다. 첫 번째 위치가 유지됩니다.
    pub fn dedup_json_columns(&mut self) {
        let mut seen = Vec::with_capacity(self.json_columns.len());
        for column in self.json_columns.drain(..) {
            if seen.contains(&column) {
                tracing::warn!(rule_id = %self.id, column = %column, "json column listed more than once, ignoring");
            } else {
                seen.push(column);
            }
        }
        self.json_columns = seen;
    }

    /// 룰의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.id.is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule_id: "(empty)".to_owned(),
                reason: "rule id must not be empty".to_owned(),
            });
        }

        if self.id.len() > MAX_RULE_ID_LEN {
            return Err(LogPipelineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: format!("rule id must not exceed {MAX_RULE_ID_LEN} characters"),
            });
        }

        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(LogPipelineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "rule id may only contain [A-Za-z0-9_-]".to_owned(),
            });
        }

        if self.json_log_length == 0 {
            return Err(LogPipelineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "json_log_length must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// JSON 출력 컬럼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonColumn {
    /// 형식화된 날짜
    Date,
    /// 로그 레벨
    Level,
    /// 소스 어댑터
    Source,
    /// 메시지
    Msg,
}

impl JsonColumn {
    /// 기본 컬럼 순서
    pub const ALL: [JsonColumn; 4] = [
        JsonColumn::Date,
        JsonColumn::Level,
        JsonColumn::Source,
        JsonColumn::Msg,
    ];

    /// 이름으로 컬럼을 찾습니다 (대소문자 무시).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(name))
    }

    /// JSON 키 이름
    pub fn key(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Level => "level",
            Self::Source => "source",
            Self::Msg => "msg",
        }
    }
}

impl fmt::Display for JsonColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// `clean` 토큰
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanToken<'a> {
    /// 리터럴 부분 문자열
    Literal(&'a str),
    /// 정규식 (슬래시 제외한 패턴)
    Pattern(&'a str),
}

impl<'a> CleanToken<'a> {
    /// `/pattern/` 형식이면 정규식, 아니면 리터럴로 해석합니다.
    pub fn from_raw(raw: &'a str) -> Self {
        match raw
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(pattern) if !pattern.is_empty() => Self::Pattern(pattern),
            _ => Self::Literal(raw),
        }
    }
}
