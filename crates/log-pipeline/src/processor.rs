//! 처리 주기 -- 대기 라인을 정규화/파싱/배정하고 룰별 히스토리를 갱신합니다.
//!
//! 한 주기의 흐름:
//! ```text
//! RawLine -> normalize -> parse -> FilterEngine::assign -> RuleBuffers
//!   -> (룰별) clean -> HistoryProjector::project -> StateStore -> RulePublication
//! ```
//!
//! 상태 저장소 읽기/쓰기 실패는 해당 룰만 실패로 처리하고 나머지 룰은 계속 진행합니다.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::mpsc;

use logsieve_core::metrics as m;

use crate::collector::{RawLine, SourcePosition};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::history::HistoryProjector;
use crate::normalizer::LineNormalizer;
use crate::parser::LineParser;
use crate::rule::{FilterEngine, FilterRule, RuleBuffers};
use crate::state::{self, SOURCE_POSITION_KEY, StateStore};

/// 룰 출력 갱신 알림
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RulePublication {
    /// 룰 ID
    pub rule_id: String,
    /// 히스토리 라인 수
    pub line_count: usize,
    /// JSON 행 수
    pub json_count: usize,
    /// clear 요청에 의한 재구성 여부
    pub rebuild: bool,
    /// 게시 시각 (로컬)
    pub published_at: NaiveDateTime,
}

/// 한 주기의 처리 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 입력 라인 수
    pub received: usize,
    /// 정규화 후 비어 있거나 블랙리스트로 제거된 라인 수
    pub dropped: usize,
    /// 파싱 불가 라인 수
    pub unparsed: usize,
    /// 룰 배정 수 (라인 x 룰)
    pub matched: usize,
    /// 게시된 룰 수
    pub published: usize,
    /// 상태 저장소 오류로 실패한 룰 수
    pub failed: usize,
}

/// 처리 주기 실행기
pub struct CycleProcessor {
    normalizer: LineNormalizer,
    parser: LineParser,
    engine: FilterEngine,
    projector: HistoryProjector,
    store: Arc<dyn StateStore>,
    publications: Option<mpsc::Sender<RulePublication>>,
    verbose: bool,
}

impl CycleProcessor {
    /// 새 실행기를 생성합니다.
    pub fn new(
        config: &PipelineConfig,
        engine: FilterEngine,
        store: Arc<dyn StateStore>,
        publications: Option<mpsc::Sender<RulePublication>>,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            normalizer: LineNormalizer::new(
                config.global_blacklist.clone(),
                config.clean_whitespace,
            )?,
            parser: LineParser::new()?,
            engine,
            projector: HistoryProjector::new(config)?,
            store,
            publications,
            verbose: config.verbose_cycles,
        })
    }

    /// 필터 엔진
    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    /// 저장된 수집 위치를 읽습니다.
    pub async fn stored_position(&self) -> Option<SourcePosition> {
        match self.store.get(SOURCE_POSITION_KEY).await {
            Ok(Some(value)) => match serde_json::from_str(&value.value) {
                Ok(position) => Some(position),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring malformed stored source position");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored source position");
                None
            }
        }
    }

    /// 대기 라인으로 한 주기를 실행합니다.
    pub async fn run_cycle(&self, lines: Vec<RawLine>) -> CycleReport {
        let started = std::time::Instant::now();
        let mut report = CycleReport {
            received: lines.len(),
            ..CycleReport::default()
        };
        let mut buffers = RuleBuffers::new();
        let mut last_position = None;

        for raw in lines {
            if raw.position.is_some() {
                last_position = raw.position;
            }
            let normalized = self.normalizer.normalize(&String::from_utf8_lossy(&raw.data));
            if normalized.is_empty() {
                report.dropped += 1;
                continue;
            }
            if self.parser.parse(&normalized).is_none() {
                report.unparsed += 1;
                continue;
            }
            report.matched += self.engine.assign(&normalized, &mut buffers);
        }

        let now = chrono::Local::now().naive_local();
        for rule in self.engine.rules() {
            // 새 라인이 없어도 저장된 히스토리가 있으면 다시 투영 (오늘/어제 표기 갱신)
            let cleaned = self.engine.take_cleaned(rule, &mut buffers);
            if !cleaned.is_empty() {
                metrics::counter!(m::LOG_PIPELINE_LINES_MATCHED_TOTAL, m::LABEL_RULE => rule.id.clone())
                    .increment(cleaned.len() as u64);
            }

            match self.publish_rule(rule, &cleaned, false, now).await {
                Ok(true) => report.published += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!(m::LOG_PIPELINE_PUBLISH_ERRORS_TOTAL, m::LABEL_RULE => rule.id.clone())
                        .increment(1);
                    tracing::warn!(rule_id = %rule.id, error = %e, "rule update failed, will retry next cycle");
                }
            }
        }

        if let Some(position) = last_position {
            self.save_position(&position).await;
        }
        if let Err(e) = self.store.flush().await {
            tracing::warn!(error = %e, "failed to flush state store");
        }

        metrics::counter!(m::LOG_PIPELINE_LINES_RECEIVED_TOTAL).increment(report.received as u64);
        metrics::counter!(m::LOG_PIPELINE_LINES_DROPPED_TOTAL).increment(report.dropped as u64);
        metrics::counter!(m::LOG_PIPELINE_LINES_UNPARSED_TOTAL).increment(report.unparsed as u64);
        metrics::counter!(m::LOG_PIPELINE_CYCLES_TOTAL).increment(1);
        metrics::histogram!(m::LOG_PIPELINE_CYCLE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        if self.verbose {
            tracing::info!(
                received = report.received,
                dropped = report.dropped,
                unparsed = report.unparsed,
                matched = report.matched,
                published = report.published,
                failed = report.failed,
                "cycle finished"
            );
        } else {
            tracing::debug!(
                received = report.received,
                matched = report.matched,
                published = report.published,
                "cycle finished"
            );
        }

        report
    }

    /// 룰을 clear하고 재구성 전용 주기를 실행합니다.
    ///
    /// 게시되었으면 `true`를 반환합니다.
    pub async fn clear(&self, rule_id: &str) -> Result<bool, LogPipelineError> {
        let rule = self
            .engine
            .rule(rule_id)
            .ok_or_else(|| LogPipelineError::UnknownRule(rule_id.to_owned()))?;

        self.store
            .set(&state::clear_key(rule_id), "true".to_owned())
            .await?;
        tracing::info!(rule_id = %rule_id, "clear marker set");

        let now = chrono::Local::now().naive_local();
        let published = self.publish_rule(rule, &[], true, now).await?;
        self.store.flush().await?;
        Ok(published)
    }

    /// 룰 하나의 히스토리를 갱신하고 게시합니다.
    async fn publish_rule(
        &self,
        rule: &FilterRule,
        new_lines: &[String],
        rebuild: bool,
        now: NaiveDateTime,
    ) -> Result<bool, LogPipelineError> {
        let stored = self.store.get(&state::log_key(&rule.id)).await?;
        let clear = self.store.get(&state::clear_key(&rule.id)).await?;
        let marker = state::clear_marker(clear.as_ref());

        let Some(projection) = self.projector.project(
            rule,
            new_lines,
            stored.as_ref().map(|v| v.value.as_str()),
            marker,
            now,
        ) else {
            return Ok(false);
        };

        // `<id>.log`는 항상 마지막에 기록
        if let Some(json) = projection.json {
            self.store.set(&state::json_key(&rule.id), json).await?;
            self.store
                .set(
                    &state::json_count_key(&rule.id),
                    projection.json_count.to_string(),
                )
                .await?;
        }
        self.store
            .set(&state::log_key(&rule.id), projection.flat)
            .await?;

        let publication = RulePublication {
            rule_id: rule.id.clone(),
            line_count: projection.line_count,
            json_count: projection.json_count,
            rebuild,
            published_at: now,
        };
        tracing::debug!(
            rule_id = %rule.id,
            lines = publication.line_count,
            json_rows = publication.json_count,
            rebuild,
            "rule published"
        );
        if let Some(tx) = &self.publications {
            match tx.try_send(publication) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(rule_id = %rule.id, "publication channel full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(rule_id = %rule.id, "publication channel closed");
                }
            }
        }
        Ok(true)
    }

    async fn save_position(&self, position: &SourcePosition) {
        let value = match serde_json::to_string(position) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode source position");
                return;
            }
        };
        if let Err(e) = self.store.set(SOURCE_POSITION_KEY, value).await {
            tracing::warn!(error = %e, "failed to store source position");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use logsieve_core::error::StateError;
    use logsieve_core::pipeline::BoxFuture;

    use crate::state::{MemoryStateStore, StateValue};

    const INFO_LINE: &str =
        "2018-07-22 12:45:02.769  - info: javascript.0 Stop script script.js.ScriptAbc";

    fn rule_with_all(id: &str, term: &str) -> FilterRule {
        let mut rule = FilterRule::new(id);
        rule.filter_all = vec![term.to_owned()];
        rule
    }

    fn processor(
        rules: Vec<FilterRule>,
        store: MemoryStateStore,
        config: PipelineConfig,
    ) -> (CycleProcessor, mpsc::Receiver<RulePublication>) {
        let (tx, rx) = mpsc::channel(16);
        let engine = FilterEngine::from_rules(rules).unwrap();
        let processor = CycleProcessor::new(&config, engine, Arc::new(store), Some(tx)).unwrap();
        (processor, rx)
    }

    fn raw(text: &str) -> RawLine {
        RawLine::new(text.to_owned(), "test")
    }

    async fn value(store: &MemoryStateStore, key: &str) -> Option<String> {
        store.get(key).await.unwrap().map(|v| v.value)
    }

    #[tokio::test]
    async fn cycle_publishes_matching_rules() {
        let store = MemoryStateStore::new();
        let (p, mut rx) = processor(
            vec![
                FilterRule::new("all"),
                rule_with_all("info", " - info: "),
                rule_with_all("error", " - error: "),
            ],
            store.clone(),
            PipelineConfig::default(),
        );

        let report = p
            .run_cycle(vec![raw(INFO_LINE), raw("garbage"), raw("   ")])
            .await;
        assert_eq!(report.received, 3);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.unparsed, 1);
        assert_eq!(report.matched, 2);
        assert_eq!(report.published, 2);

        let expected = "2018-07-22 12:45:02.769 - info: javascript.0 Stop script script.js.ScriptAbc";
        assert_eq!(value(&store, "info.log").await.as_deref(), Some(expected));
        assert_eq!(value(&store, "info.jsonCount").await.as_deref(), Some("1"));
        assert!(value(&store, "error.log").await.is_none());

        let first = rx.try_recv().unwrap();
        assert_eq!(first.rule_id, "all");
        assert!(!first.rebuild);
        assert_eq!(rx.try_recv().unwrap().rule_id, "info");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn global_blacklist_drops_line_everywhere() {
        let store = MemoryStateStore::new();
        let config = PipelineConfig {
            global_blacklist: vec!["ScriptAbc".to_owned()],
            ..PipelineConfig::default()
        };
        let (p, mut rx) = processor(vec![FilterRule::new("all")], store.clone(), config);

        let report = p.run_cycle(vec![raw(INFO_LINE)]).await;
        assert_eq!(report.dropped, 1);
        assert_eq!(report.published, 0);
        assert!(store.is_empty().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn merge_accumulates_across_cycles() {
        let store = MemoryStateStore::new();
        let mut rule = FilterRule::new("warn");
        rule.merge = true;
        let (p, _rx) = processor(vec![rule], store.clone(), PipelineConfig::default());

        p.run_cycle(vec![
            raw("2024-01-05 08:01:00.000 - warn: hue.0 bridge unreachable"),
            raw("2024-01-05 08:02:00.000 - warn: hue.0 bridge unreachable"),
            raw("2024-01-05 08:03:00.000 - warn: hue.0 bridge unreachable"),
        ])
        .await;
        assert_eq!(
            value(&store, "warn.log").await.as_deref(),
            Some("2024-01-05 08:03:00.000 - warn: hue.0 [3 entries] bridge unreachable")
        );

        p.run_cycle(vec![
            raw("2024-01-05 08:04:00.000 - warn: hue.0 bridge unreachable"),
            raw("2024-01-05 08:05:00.000 - warn: hue.0 bridge unreachable"),
        ])
        .await;
        assert_eq!(
            value(&store, "warn.log").await.as_deref(),
            Some("2024-01-05 08:05:00.000 - warn: hue.0 [5 entries] bridge unreachable")
        );
    }

    #[tokio::test]
    async fn clear_rebuilds_and_hides_old_json_rows() {
        let store = MemoryStateStore::new();
        let (p, mut rx) = processor(vec![FilterRule::new("all")], store.clone(), PipelineConfig::default());

        p.run_cycle(vec![raw("2024-01-05 08:00:00.000 - info: a.0 before clear")])
            .await;
        assert_eq!(value(&store, "all.jsonCount").await.as_deref(), Some("1"));
        let _ = rx.try_recv();

        assert!(p.clear("all").await.unwrap());
        assert_eq!(value(&store, "all.clear").await.as_deref(), Some("true"));
        assert_eq!(value(&store, "all.jsonCount").await.as_deref(), Some("0"));
        assert_eq!(value(&store, "all.json").await.as_deref(), Some("[]"));
        assert_eq!(
            value(&store, "all.log").await.as_deref(),
            Some("2024-01-05 08:00:00.000 - info: a.0 before clear")
        );
        assert!(rx.try_recv().unwrap().rebuild);
    }

    #[tokio::test]
    async fn clear_of_empty_rule_does_not_publish() {
        let store = MemoryStateStore::new();
        let (p, mut rx) = processor(vec![FilterRule::new("all")], store.clone(), PipelineConfig::default());
        assert!(!p.clear("all").await.unwrap());
        assert!(value(&store, "all.log").await.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn clear_of_unknown_rule_fails() {
        let (p, _rx) = processor(vec![], MemoryStateStore::new(), PipelineConfig::default());
        assert!(matches!(
            p.clear("nope").await,
            Err(LogPipelineError::UnknownRule(_))
        ));
    }

    #[tokio::test]
    async fn marker_from_store_filters_json_rows() {
        let store = MemoryStateStore::new();
        let marker = chrono::NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        store
            .insert(
                "all.clear",
                StateValue {
                    value: "true".to_owned(),
                    modified_at: marker,
                },
            )
            .await;
        let (p, _rx) = processor(vec![FilterRule::new("all")], store.clone(), PipelineConfig::default());
        p.run_cycle(vec![
            raw("2024-01-05 08:00:00.000 - info: a.0 before"),
            raw("2024-01-05 09:00:00.000 - info: a.0 after"),
        ])
        .await;
        assert_eq!(value(&store, "all.jsonCount").await.as_deref(), Some("1"));
        assert_eq!(
            value(&store, "all.log").await.map(|l| l.lines().count()),
            Some(2)
        );
    }

    #[tokio::test]
    async fn position_is_stored_after_cycle() {
        let store = MemoryStateStore::new();
        let (p, _rx) = processor(vec![FilterRule::new("all")], store.clone(), PipelineConfig::default());
        assert!(p.stored_position().await.is_none());

        let position = SourcePosition {
            path: "/tmp/iobroker.2024-01-05.log".to_owned(),
            offset: 120,
        };
        p.run_cycle(vec![raw(INFO_LINE).with_position(position.clone())])
            .await;
        assert_eq!(p.stored_position().await, Some(position));
    }

    #[tokio::test]
    async fn clean_tokens_apply_before_storage() {
        let store = MemoryStateStore::new();
        let mut rule = FilterRule::new("alexa");
        rule.filter_all = vec!["[Alexa-Log-Script]".to_owned()];
        rule.clean = vec![r"/script\.js\.[^:]*: \[Alexa-Log-Script]/".to_owned()];
        let (p, _rx) = processor(vec![rule], store.clone(), PipelineConfig::default());

        p.run_cycle(vec![raw(
            "2024-01-05 08:00:00.000 - info: javascript.0 script.js.Alexa: [Alexa-Log-Script] Licht an",
        )])
        .await;
        assert_eq!(
            value(&store, "alexa.log").await.as_deref(),
            Some("2024-01-05 08:00:00.000 - info: javascript.0  Licht an")
        );
    }

    #[tokio::test]
    async fn rule_with_history_is_republished_without_new_lines() {
        let store = MemoryStateStore::new();
        store
            .insert(
                "b.log",
                StateValue::now("2024-01-04 07:00:00.000 - info: x.0 beta restarted"),
            )
            .await;
        let (p, mut rx) = processor(
            vec![rule_with_all("a", "alpha"), rule_with_all("b", "beta")],
            store.clone(),
            PipelineConfig::default(),
        );

        let report = p
            .run_cycle(vec![raw("2024-01-05 08:00:00.000 - info: x.0 alpha started")])
            .await;
        assert_eq!(report.matched, 1);
        assert_eq!(report.published, 2);
        assert_eq!(rx.try_recv().unwrap().rule_id, "a");
        assert_eq!(rx.try_recv().unwrap().rule_id, "b");
        assert_eq!(value(&store, "b.jsonCount").await.as_deref(), Some("1"));
        assert!(value(&store, "b.json").await.unwrap().contains("beta restarted"));

        // 입력이 없는 주기도 히스토리가 있는 룰은 모두 다시 게시
        let report = p.run_cycle(Vec::new()).await;
        assert_eq!(report.received, 0);
        assert_eq!(report.published, 2);
    }

    fn numbered(n: u32) -> String {
        format!("2024-01-05 08:{n:02}:00.000 - info: x.0 event {n}")
    }

    async fn assert_history_stays_bounded(sort_descending: bool) {
        let store = MemoryStateStore::new();
        let mut rule = FilterRule::new("all");
        rule.sort_descending = sort_descending;
        let config = PipelineConfig {
            max_log_lines: 3,
            ..PipelineConfig::default()
        };
        let (p, _rx) = processor(vec![rule], store.clone(), config);

        for cycle in 1..=4u32 {
            p.run_cycle(vec![raw(&numbered(2 * cycle - 1)), raw(&numbered(2 * cycle))])
                .await;

            let mut expected: Vec<String> = (1..=2 * cycle).rev().take(3).map(numbered).collect();
            if !sort_descending {
                expected.reverse();
            }
            let log = value(&store, "all.log").await.unwrap();
            assert!(log.lines().count() <= 3, "cycle {cycle}: {log}");
            assert_eq!(log, expected.join("\n"), "cycle {cycle}");
            assert_eq!(
                value(&store, "all.jsonCount").await.as_deref(),
                Some(expected.len().to_string().as_str())
            );
        }
    }

    #[tokio::test]
    async fn history_keeps_newest_lines_across_cycles() {
        assert_history_stays_bounded(true).await;
    }

    #[tokio::test]
    async fn ascending_history_keeps_newest_lines_across_cycles() {
        assert_history_stays_bounded(false).await;
    }

    /// 접미사가 일치하는 키의 쓰기를 실패시키는 저장소
    struct FailingWrites {
        inner: MemoryStateStore,
        suffix: &'static str,
        failing: AtomicBool,
    }

    impl StateStore for FailingWrites {
        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StateValue>, StateError>> {
            self.inner.get(key)
        }

        fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StateError>> {
            if self.failing.load(Ordering::Relaxed) && key.ends_with(self.suffix) {
                return Box::pin(async move {
                    Err(StateError::Write {
                        key: key.to_owned(),
                        reason: "disk full".to_owned(),
                    })
                });
            }
            self.inner.set(key, value)
        }

        fn flush(&self) -> BoxFuture<'_, Result<(), StateError>> {
            self.inner.flush()
        }
    }

    #[tokio::test]
    async fn failed_json_write_leaves_history_untouched() {
        let store = Arc::new(FailingWrites {
            inner: MemoryStateStore::new(),
            suffix: ".json",
            failing: AtomicBool::new(false),
        });
        let engine = FilterEngine::from_rules(vec![FilterRule::new("all")]).unwrap();
        let p = CycleProcessor::new(&PipelineConfig::default(), engine, store.clone(), None).unwrap();

        p.run_cycle(vec![raw(&numbered(1))]).await;
        store.failing.store(true, Ordering::Relaxed);
        let report = p.run_cycle(vec![raw(&numbered(2))]).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.published, 0);

        // 실패한 주기는 어떤 키도 앞서 나가지 않음
        assert_eq!(value(&store.inner, "all.log").await, Some(numbered(1)));
        assert_eq!(value(&store.inner, "all.jsonCount").await.as_deref(), Some("1"));

        store.failing.store(false, Ordering::Relaxed);
        let report = p.run_cycle(Vec::new()).await;
        assert_eq!(report.published, 1);
        let json = value(&store.inner, "all.json").await.unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(value(&store.inner, "all.log").await, Some(numbered(1)));
    }
}
