//! 히스토리 프로젝터 -- 룰별 누적 히스토리를 갱신하고 출력 형태로 변환합니다.
//!
//! 처리 순서:
//! 1. 새 라인 + 저장된 히스토리 결합
//! 2. 정확히 같은 라인 제거 (먼저 나온 것 유지), 빈 라인 제거
//! 3. 내장 타임스탬프 기준 최신순 정렬 (파싱 불가 라인은 뒤로)
//! 4. `merge` 룰이면 병합
//! 5. `max_log_lines`로 절단
//! 6. JSON 행 생성 (clear 마커 이전 행 숨김)
//! 7. 오름차순 룰이면 뒤집기
//!
//! 새 라인 없이 호출하면 재구성 전용 모드입니다.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;
use serde::Deserialize;
use serde::ser::{Serialize, SerializeMap, Serializer};

use logsieve_core::types::ParsedEntry;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::merge::MergeEngine;
use crate::parser::{LineParser, timestamp_of};
use crate::rule::{FilterRule, JsonColumn};

/// 메시지 내장 JSON 페이로드 패턴 (`##{...}##`)
const PAYLOAD_PATTERN: &str = r"##(\{.*\})##";

/// 룰 하나의 프로젝션 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// 개행으로 연결된 히스토리
    pub flat: String,
    /// JSON 배열 (컬럼이 없으면 `None`)
    pub json: Option<String>,
    /// JSON 행 수
    pub json_count: usize,
    /// 히스토리 라인 수
    pub line_count: usize,
}

/// 메시지 내장 페이로드
#[derive(Debug, Deserialize)]
struct EmbeddedPayload {
    msg: Option<String>,
    source: Option<String>,
}

/// 컬럼 순서를 유지하는 JSON 행
struct JsonRow(Vec<(JsonColumn, String)>);

impl Serialize for JsonRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column.key(), value)?;
        }
        map.end()
    }
}

/// 히스토리 프로젝터
#[derive(Debug, Clone)]
pub struct HistoryProjector {
    max_log_lines: usize,
    today_label: String,
    yesterday_label: String,
    parser: LineParser,
    merger: MergeEngine,
    payload: Regex,
}

impl HistoryProjector {
    /// 파이프라인 설정으로 프로젝터를 생성합니다.
    pub fn new(config: &PipelineConfig) -> Result<Self, LogPipelineError> {
        Ok(Self {
            max_log_lines: config.max_log_lines,
            today_label: config.today_label.clone(),
            yesterday_label: config.yesterday_label.clone(),
            parser: LineParser::new()?,
            merger: MergeEngine::new(config.merge_label.clone())?,
            payload: Regex::new(PAYLOAD_PATTERN)?,
        })
    }

    /// 새 라인과 저장된 히스토리로 프로젝션을 계산합니다.
    ///
    /// 남는 라인이 없으면 `None`을 반환하며, 호출자는 상태를 갱신하지 않습니다.
    pub fn project(
        &self,
        rule: &FilterRule,
        new_lines: &[String],
        stored: Option<&str>,
        clear_marker: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Option<Projection> {
        let mut seen = HashSet::new();
        let mut lines: Vec<String> = new_lines
            .iter()
            .flat_map(|chunk| chunk.split('\n'))
            .chain(stored.into_iter().flat_map(|s| s.split('\n')))
            .filter(|line| !line.trim().is_empty())
            .filter(|line| seen.insert(*line))
            .map(str::to_owned)
            .collect();

        if lines.is_empty() {
            return None;
        }

        lines.sort_by(|a, b| newest_first(timestamp_of(a), timestamp_of(b)));

        if rule.merge {
            lines = self.merger.merge(lines);
        }
        lines.truncate(self.max_log_lines);

        let (json, json_count) = if rule.json_columns.is_empty() {
            tracing::debug!(rule_id = %rule.id, "rule has no json columns, skipping json projection");
            (None, 0)
        } else {
            let mut rows = self.json_rows(rule, &lines, clear_marker, now);
            if !rule.sort_descending {
                rows.reverse();
            }
            let count = rows.len();
            match serde_json::to_string(&rows) {
                Ok(json) => (Some(json), count),
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "failed to serialize json rows");
                    (None, 0)
                }
            }
        };

        if !rule.sort_descending {
            lines.reverse();
        }

        Some(Projection {
            flat: lines.join("\n"),
            json,
            json_count,
            line_count: lines.len(),
        })
    }

    /// 최신순 라인에서 JSON 행을 만듭니다.
    fn json_rows(
        &self,
        rule: &FilterRule,
        lines: &[String],
        clear_marker: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Vec<JsonRow> {
        lines
            .iter()
            .filter_map(|line| self.parser.parse(line))
            .filter(|entry| match clear_marker {
                None => true,
                Some(marker) => entry.timestamp_value().is_some_and(|ts| ts >= marker),
            })
            .take(rule.json_max_lines)
            .map(|entry| self.json_row(rule, &entry, now))
            .collect()
    }

    fn json_row(&self, rule: &FilterRule, entry: &ParsedEntry, now: NaiveDateTime) -> JsonRow {
        let mut msg = entry.message.clone();
        let mut source = entry.source.clone();
        if let Some(payload) = self.embedded_payload(&entry.message) {
            if let Some(m) = payload.msg {
                msg = m;
            }
            if let Some(s) = payload.source {
                source = s;
            }
        }
        let msg: String = msg.chars().take(rule.json_log_length).collect();

        let date = entry
            .timestamp_value()
            .map(|ts| {
                format_date(
                    &rule.json_date_format,
                    ts,
                    now,
                    &self.today_label,
                    &self.yesterday_label,
                )
            })
            .unwrap_or_else(|| entry.timestamp.clone());

        let level = entry.level.as_str();
        let cells = rule
            .json_columns
            .iter()
            .map(|&column| {
                let value = match column {
                    JsonColumn::Date => date.clone(),
                    JsonColumn::Level => level.to_owned(),
                    JsonColumn::Source => source.clone(),
                    JsonColumn::Msg => msg.clone(),
                };
                let styled = !rule.json_css_to_level || column == JsonColumn::Level;
                let value = if styled {
                    format!("<span class='log-{level}'>{value}</span>")
                } else {
                    value
                };
                (column, value)
            })
            .collect();
        JsonRow(cells)
    }

    fn embedded_payload(&self, message: &str) -> Option<EmbeddedPayload> {
        let raw = self.payload.captures(message)?.get(1)?.as_str();
        match serde_json::from_str(raw) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed embedded payload");
                None
            }
        }
    }
}

/// 최신순 비교. 타임스탬프 없는 라인은 뒤로 보냅니다.
fn newest_first(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `json_date_format` 패턴으로 타임스탬프를 형식화합니다.
///
/// 토큰: `YYYY`, `YY`, `MM`, `DD`, `hh`, `mm`, `ss`, `ms`.
/// `#...#` 구간은 오늘/어제이면 라벨로, 아니면 내부 토큰으로 렌더링합니다.
pub fn format_date(
    pattern: &str,
    ts: NaiveDateTime,
    now: NaiveDateTime,
    today_label: &str,
    yesterday_label: &str,
) -> String {
    let Some(start) = pattern.find('#') else {
        return format_tokens(pattern, ts);
    };
    let Some(len) = pattern[start + 1..].find('#') else {
        return format_tokens(pattern, ts);
    };
    let end = start + 1 + len;

    let date = ts.date();
    let today = now.date();
    let section = if date == today {
        today_label.to_owned()
    } else if today.pred_opt() == Some(date) {
        yesterday_label.to_owned()
    } else {
        format_tokens(&pattern[start + 1..end], ts)
    };

    format!(
        "{}{}{}",
        format_tokens(&pattern[..start], ts),
        section,
        format_tokens(&pattern[end + 1..], ts)
    )
}

fn format_tokens(pattern: &str, ts: NaiveDateTime) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    while !rest.is_empty() {
        let (rendered, consumed) = if rest.starts_with("YYYY") {
            (format!("{:04}", ts.year()), 4)
        } else if rest.starts_with("YY") {
            (format!("{:02}", ts.year().rem_euclid(100)), 2)
        } else if rest.starts_with("MM") {
            (format!("{:02}", ts.month()), 2)
        } else if rest.starts_with("DD") {
            (format!("{:02}", ts.day()), 2)
        } else if rest.starts_with("hh") {
            (format!("{:02}", ts.hour()), 2)
        } else if rest.starts_with("mm") {
            (format!("{:02}", ts.minute()), 2)
        } else if rest.starts_with("ss") {
            (format!("{:02}", ts.second()), 2)
        } else if rest.starts_with("ms") {
            (format!("{:03}", ts.nanosecond() / 1_000_000 % 1000), 2)
        } else {
            let Some(c) = rest.chars().next() else { break };
            out.push(c);
            rest = &rest[c.len_utf8()..];
            continue;
        };
        out.push_str(&rendered);
        rest = &rest[consumed..];
    }
    out
}
