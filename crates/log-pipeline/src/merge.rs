//! 병합 엔진 -- 반복 메시지를 카운터가 붙은 한 줄로 합칩니다.
//!
//! 입력은 최신순 라인 목록입니다. 메시지 앞의 `[N <label>] ` 접두사는
//! 이전 병합 결과로 보고 카운트에 합산합니다.
//!
//! ```text
//! 2024-01-05 08:15:00.000 - info: weather.0 Wetterdaten abrufen
//! 2024-01-05 08:10:00.000 - info: weather.0 Wetterdaten abrufen
//!   => 2024-01-05 08:15:00.000 - info: weather.0 [2 entries] Wetterdaten abrufen
//! ```

use std::collections::HashMap;

use regex::Regex;

use logsieve_core::types::ParsedEntry;

use crate::error::LogPipelineError;
use crate::parser::LineParser;

/// 병합 엔진
///
/// 호출 단위로 상태를 갖지 않으므로 룰 간에 데이터가 섞이지 않습니다.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    label: String,
    prefix: Regex,
    parser: LineParser,
}

/// 병합 그룹
struct Group {
    /// 가장 최신 멤버
    head: ParsedEntry,
    /// 가장 최신 멤버의 원본 라인
    head_line: String,
    canonical: String,
    count: u64,
    members: usize,
}

/// 출력 슬롯
enum Slot {
    /// 파싱 불가 라인 (그대로 유지)
    Verbatim(String),
    /// 그룹 인덱스
    Group(usize),
}

impl MergeEngine {
    /// 카운터 라벨로 엔진을 생성합니다.
    pub fn new(label: impl Into<String>) -> Result<Self, LogPipelineError> {
        let label = label.into();
        let prefix = Regex::new(&format!(r"^\[(\d+) {}\] (.*)$", regex::escape(&label)))?;
        Ok(Self {
            label,
            prefix,
            parser: LineParser::new()?,
        })
    }

    /// 카운터 라벨
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 메시지를 (카운트, 정규 메시지)로 분리합니다.
    fn split_counter<'a>(&self, message: &'a str) -> (u64, &'a str) {
        self.prefix
            .captures(message)
            .and_then(|caps| {
                let count = caps.get(1)?.as_str().parse::<u64>().ok()?;
                Some((count, caps.get(2)?.as_str()))
            })
            .unwrap_or((1, message))
    }

    /// 최신순 라인 목록을 병합합니다.
    ///
    /// 멤버가 둘 이상인 그룹은 가장 최신 멤버 위치에 병합 라인 하나로 대체됩니다.
    pub fn merge(&self, lines: Vec<String>) -> Vec<String> {
        let mut slots = Vec::with_capacity(lines.len());
        let mut groups: Vec<Group> = Vec::new();
        let mut by_message: HashMap<String, usize> = HashMap::new();

        for line in lines {
            let Some(entry) = self.parser.parse(&line) else {
                slots.push(Slot::Verbatim(line));
                continue;
            };
            let (count, canonical) = self.split_counter(&entry.message);
            let canonical = canonical.to_owned();

            match by_message.get(&canonical) {
                Some(&idx) => {
                    let group = &mut groups[idx];
                    group.count = group.count.saturating_add(count);
                    group.members += 1;
                }
                None => {
                    by_message.insert(canonical.clone(), groups.len());
                    slots.push(Slot::Group(groups.len()));
                    groups.push(Group {
                        head: entry,
                        head_line: line,
                        canonical,
                        count,
                        members: 1,
                    });
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Verbatim(line) => line,
                Slot::Group(idx) => {
                    let group = &groups[idx];
                    if group.members == 1 {
                        group.head_line.clone()
                    } else {
                        format!(
                            "{} - {}: {} [{} {}] {}",
                            group.head.timestamp,
                            group.head.level,
                            group.head.source,
                            group.count,
                            self.label,
                            group.canonical
                        )
                    }
                }
            })
            .collect()
    }
}
