//! 파이프라인 오케스트레이션 -- 수집/정규화/매칭/히스토리 갱신의 전체 흐름을 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](logsieve_core::pipeline::Pipeline) trait을 구현하여
//! `logsieve-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileCollector ─┐
//! EventReceiver ─┼─> mpsc (buffer_capacity) -> 처리 태스크 -> LogBuffer
//!                │                                 │ (update tick)
//! TriggerDir ────┴─> ClearHandle ──────────────────┤
//!                                                  v
//!                                   CycleProcessor -> StateStore -> RulePublication
//! ```
//!
//! 처리 태스크만 룰 히스토리를 변경하므로 한 룰이 두 주기에 동시에 갱신되지 않습니다.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logsieve_core::error::{LogsieveError, PipelineError};
use logsieve_core::metrics as m;
use logsieve_core::pipeline::{HealthStatus, Pipeline};
use logsieve_core::types::LogRecord;

use crate::buffer::LogBuffer;
use crate::collector::{
    EventReceiver, FileCollector, FileCollectorConfig, LogFileLocator, RawLine, SourcePosition,
};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::processor::{CycleProcessor, CycleReport, RulePublication};
use crate::rule::FilterEngine;
use crate::state::{MemoryStateStore, StateStore};
use crate::trigger::{ClearHandle, TriggerDirWatcher};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 파이프라인 누적 통계
#[derive(Debug, Default)]
pub struct PipelineStats {
    lines_received: AtomicU64,
    lines_dropped: AtomicU64,
    lines_unparsed: AtomicU64,
    lines_matched: AtomicU64,
    cycles: AtomicU64,
    rules_published: AtomicU64,
    publish_failures: AtomicU64,
    clears: AtomicU64,
}

impl PipelineStats {
    fn record_cycle(&self, report: &CycleReport) {
        self.lines_received
            .fetch_add(report.received as u64, Ordering::Relaxed);
        self.lines_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
        self.lines_unparsed
            .fetch_add(report.unparsed as u64, Ordering::Relaxed);
        self.lines_matched
            .fetch_add(report.matched as u64, Ordering::Relaxed);
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.rules_published
            .fetch_add(report.published as u64, Ordering::Relaxed);
        self.publish_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    /// 처리 주기에 들어온 라인 수
    pub fn lines_received(&self) -> u64 {
        self.lines_received.load(Ordering::Relaxed)
    }

    /// 정규화 또는 버퍼 오버플로우로 버려진 라인 수
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped.load(Ordering::Relaxed)
    }

    /// 파싱 불가 라인 수
    pub fn lines_unparsed(&self) -> u64 {
        self.lines_unparsed.load(Ordering::Relaxed)
    }

    /// 룰 배정 수
    pub fn lines_matched(&self) -> u64 {
        self.lines_matched.load(Ordering::Relaxed)
    }

    /// 실행된 처리 주기 수
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// 룰 게시 횟수
    pub fn rules_published(&self) -> u64 {
        self.rules_published.load(Ordering::Relaxed)
    }

    /// 상태 저장소 오류로 실패한 룰 갱신 수
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    /// 처리된 clear 요청 수
    pub fn clears(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }
}

/// 처리 태스크와 파이프라인 핸들이 공유하는 상태
#[derive(Debug, Default)]
struct Shared {
    stats: PipelineStats,
    /// 버퍼 사용률 (`f64` 비트)
    buffer_utilization: AtomicU64,
    collector_alive: AtomicBool,
}

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logsieve_log_pipeline::{LogPipeline, LogPipelineBuilder};
///
/// let (mut pipeline, publications) = LogPipelineBuilder::new()
///     .config(config)
///     .state_store(store)
///     .build()?;
///
/// pipeline.start().await?;
/// pipeline.clear_handle().clear("warn").await?;
/// ```
pub struct LogPipeline {
    config: PipelineConfig,
    state: PipelineState,
    store: Arc<dyn StateStore>,
    publication_tx: Option<mpsc::Sender<RulePublication>>,
    record_rx: Option<mpsc::Receiver<LogRecord>>,
    clear_tx: mpsc::Sender<String>,
    clear_rx: Option<mpsc::Receiver<String>>,
    /// 수집 태스크 취소 (수집기, 이벤트 수신기, 트리거 감시자)
    ingest_cancel: CancellationToken,
    /// 처리 태스크 취소
    cancel: CancellationToken,
    ingest_tasks: Vec<JoinHandle<()>>,
    processing: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
    rule_count: usize,
    /// 지정하지 않으면 설정에서 생성
    locator: Option<LogFileLocator>,
}

impl LogPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 누적 통계
    pub fn stats(&self) -> &PipelineStats {
        &self.shared.stats
    }

    /// 로드된 룰 수 (시작 후 유효)
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// 버퍼 사용률을 반환합니다.
    pub fn buffer_utilization(&self) -> f64 {
        f64::from_bits(self.shared.buffer_utilization.load(Ordering::Relaxed))
    }

    /// clear 요청 핸들
    pub fn clear_handle(&self) -> ClearHandle {
        ClearHandle::new(self.clear_tx.clone())
    }

    /// 상태 저장소
    pub fn state_store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    async fn start_inner(&mut self) -> Result<(), LogPipelineError> {
        let mut engine = FilterEngine::new();
        self.rule_count = engine.load_rules_from_dir(&self.config.rule_dir).await?;
        if self.rule_count == 0 {
            tracing::warn!(dir = %self.config.rule_dir, "no filter rules loaded");
        }

        let processor = CycleProcessor::new(
            &self.config,
            engine,
            Arc::clone(&self.store),
            self.publication_tx.clone(),
        )?;
        let resume = processor.stored_position().await;

        let clear_rx = self.clear_rx.take().ok_or_else(|| {
            LogPipelineError::Channel("clear channel already consumed".to_owned())
        })?;
        let (raw_tx, raw_rx) = mpsc::channel(self.config.buffer_capacity);

        if self.config.event_source_enabled() {
            match self.record_rx.take() {
                Some(record_rx) => {
                    let receiver = EventReceiver::new(record_rx, raw_tx.clone());
                    let cancel = self.ingest_cancel.clone();
                    self.ingest_tasks.push(tokio::spawn(async move {
                        if let Err(e) = receiver.run(cancel).await {
                            tracing::warn!(error = %e, "event receiver exited with error");
                        }
                    }));
                }
                None => tracing::warn!("events source enabled but no record receiver attached"),
            }
        }

        if !self.config.trigger_dir.is_empty() {
            let watcher = TriggerDirWatcher::new(
                &self.config.trigger_dir,
                Duration::from_millis(self.config.poll_interval_ms),
                self.clear_handle(),
            );
            let cancel = self.ingest_cancel.clone();
            self.ingest_tasks.push(tokio::spawn(async move {
                if let Err(e) = watcher.run(cancel).await {
                    tracing::warn!(error = %e, "trigger watcher exited with error");
                }
            }));
        }

        let locator = self.locator.take().unwrap_or_else(|| {
            LogFileLocator::new(
                &self.config.log_dir,
                self.config.log_file_name.clone(),
                self.config.daily_file_prefix.clone(),
            )
        });
        let file = self.config.file_source_enabled().then(|| FileSource {
            locator,
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
            max_open_retries: self.config.max_open_retries,
            retry_delay: Duration::from_secs(self.config.retry_delay_secs),
            tx: raw_tx.clone(),
            last_position: resume,
            active: None,
        });
        drop(raw_tx);

        let processing = ProcessingLoop {
            processor,
            buffer: LogBuffer::new(self.config.buffer_capacity, self.config.drop_policy),
            raw_rx,
            clear_rx,
            file,
            shared: Arc::clone(&self.shared),
            update_interval: Duration::from_secs(self.config.update_interval_secs),
            ingest_cancel: self.ingest_cancel.clone(),
            cancel: self.cancel.clone(),
        };
        self.processing = Some(tokio::spawn(processing.run()));
        Ok(())
    }
}

impl Pipeline for LogPipeline {
    async fn start(&mut self) -> Result<(), LogsieveError> {
        match self.state {
            PipelineState::Running => return Err(PipelineError::AlreadyRunning.into()),
            PipelineState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "log pipeline cannot be restarted after stop".to_owned(),
                )
                .into());
            }
            PipelineState::Initialized => {}
        }

        tracing::info!("starting log pipeline");
        self.start_inner().await.map_err(LogsieveError::from)?;
        self.state = PipelineState::Running;
        tracing::info!(rules = self.rule_count, "log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogsieveError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");

        // 1. 수집 태스크 분리
        self.ingest_cancel.cancel();
        for task in self.ingest_tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "ingestion task panicked");
            }
        }

        // 2. 처리 태스크: 파일 수집기 대기, 남은 라인으로 마지막 주기 실행
        self.cancel.cancel();
        if let Some(handle) = self.processing.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "processing task panicked");
            }
        }

        // 3. 상태 저장
        self.store.flush().await?;

        self.state = PipelineState::Stopped;
        tracing::info!(
            cycles = self.shared.stats.cycles(),
            published = self.shared.stats.rules_published(),
            "log pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.processing.as_ref().is_none_or(|h| h.is_finished()) {
                    return HealthStatus::Unhealthy("processing task not running".to_owned());
                }
                let utilization = self.buffer_utilization();
                if utilization > 0.9 {
                    return HealthStatus::Degraded(format!(
                        "buffer utilization high: {:.1}%",
                        utilization * 100.0
                    ));
                }
                if self.config.file_source_enabled()
                    && !self.shared.collector_alive.load(Ordering::Relaxed)
                {
                    return HealthStatus::Degraded("file collector not running".to_owned());
                }
                HealthStatus::Healthy
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 실행 중인 파일 수집기
struct ActiveCollector {
    path: PathBuf,
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), LogPipelineError>>,
}

/// 파일 소스 관리 -- 일별 파일 전환과 수집기 재생성
struct FileSource {
    locator: LogFileLocator,
    poll_interval: Duration,
    max_open_retries: u32,
    retry_delay: Duration,
    tx: mpsc::Sender<RawLine>,
    /// 마지막으로 받은 라인의 위치
    last_position: Option<SourcePosition>,
    active: Option<ActiveCollector>,
}

impl FileSource {
    /// 경로의 이어 읽기 오프셋
    fn offset_for(&self, path: &std::path::Path) -> u64 {
        self.last_position
            .as_ref()
            .filter(|p| std::path::Path::new(&p.path) == path)
            .map_or(0, |p| p.offset)
    }

    fn attach(&mut self, path: PathBuf, parent: &CancellationToken) {
        let start_offset = self.offset_for(&path);
        let cancel = parent.child_token();
        let config = FileCollectorConfig {
            poll_interval: self.poll_interval,
            max_open_retries: self.max_open_retries,
            retry_delay: self.retry_delay,
            start_offset,
            ..FileCollectorConfig::new(path.clone())
        };
        let collector = FileCollector::new(config, self.tx.clone());
        let handle = tokio::spawn(collector.run(cancel.clone()));
        tracing::info!(path = %path.display(), offset = start_offset, "attached file collector");
        self.active = Some(ActiveCollector {
            path,
            cancel,
            handle,
        });
    }
}

/// 처리 태스크
struct ProcessingLoop {
    processor: CycleProcessor,
    buffer: LogBuffer,
    raw_rx: mpsc::Receiver<RawLine>,
    clear_rx: mpsc::Receiver<String>,
    file: Option<FileSource>,
    shared: Arc<Shared>,
    update_interval: Duration,
    ingest_cancel: CancellationToken,
    cancel: CancellationToken,
}

impl ProcessingLoop {
    async fn run(mut self) {
        let mut tick = tokio::time::interval(self.update_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tick.tick().await;
        self.check_file_source().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(line) = self.raw_rx.recv() => self.accept(line),
                Some(rule_id) = self.clear_rx.recv() => self.handle_clear(&rule_id).await,
                _ = tick.tick() => {
                    self.check_file_source().await;
                    self.cycle().await;
                }
            }
        }

        // 파일 수집기의 마지막 드레인을 기다린 뒤 남은 라인 처리
        if let Some(active) = self.file.as_mut().and_then(|f| f.active.take()) {
            active.cancel.cancel();
            self.await_collector(active).await;
        }
        while let Ok(line) = self.raw_rx.try_recv() {
            self.accept(line);
        }
        self.cycle().await;
        // 종료 중 트리거 감시자가 보낸 clear 요청
        while let Ok(rule_id) = self.clear_rx.try_recv() {
            self.handle_clear(&rule_id).await;
        }
        self.shared.collector_alive.store(false, Ordering::Relaxed);
        tracing::debug!("processing task finished");
    }

    fn accept(&mut self, line: RawLine) {
        if let (Some(file), Some(position)) = (self.file.as_mut(), line.position.as_ref()) {
            file.last_position = Some(position.clone());
        }
        if let Some(dropped) = self.buffer.push(line) {
            self.shared
                .stats
                .lines_dropped
                .fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                source = %dropped.source,
                bytes = dropped.data.len(),
                "buffer full, line dropped"
            );
        }
        self.publish_buffer_level();
    }

    fn publish_buffer_level(&self) {
        self.shared
            .buffer_utilization
            .store(self.buffer.utilization().to_bits(), Ordering::Relaxed);
        metrics::gauge!(m::LOG_PIPELINE_BUFFER_SIZE).set(self.buffer.len() as f64);
    }

    /// 대기 라인이 없어도 매 주기 실행합니다 (저장된 히스토리 재투영).
    async fn cycle(&mut self) {
        let lines = self.buffer.take_all();
        self.publish_buffer_level();
        let report = self.processor.run_cycle(lines).await;
        self.shared.stats.record_cycle(&report);
    }

    async fn handle_clear(&mut self, rule_id: &str) {
        match self.processor.clear(rule_id).await {
            Ok(published) => {
                self.shared.stats.clears.fetch_add(1, Ordering::Relaxed);
                tracing::info!(rule_id = %rule_id, published, "rule cleared");
            }
            Err(LogPipelineError::UnknownRule(id)) => {
                tracing::warn!(rule_id = %id, "clear requested for unknown rule");
            }
            Err(e) => {
                tracing::warn!(rule_id = %rule_id, error = %e, "clear failed");
            }
        }
    }

    /// 날짜 전환과 종료된 수집기를 확인합니다.
    async fn check_file_source(&mut self) {
        if self.ingest_cancel.is_cancelled() {
            return;
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let path = file.locator.current();

        let stale = match &file.active {
            None => None,
            Some(active) if active.path != path => {
                tracing::info!(
                    from = %active.path.display(),
                    to = %path.display(),
                    "log file rolled over"
                );
                active.cancel.cancel();
                file.active.take()
            }
            Some(active) if active.handle.is_finished() => file.active.take(),
            Some(_) => return,
        };

        if let Some(active) = stale {
            self.await_collector(active).await;
        }

        let ingest_cancel = self.ingest_cancel.clone();
        if let Some(file) = self.file.as_mut() {
            file.attach(path, &ingest_cancel);
            self.shared.collector_alive.store(true, Ordering::Relaxed);
        }
    }

    /// 수집기 종료를 기다리는 동안 채널을 계속 비웁니다.
    async fn await_collector(&mut self, active: ActiveCollector) {
        let ActiveCollector {
            path, mut handle, ..
        } = active;
        let result = loop {
            tokio::select! {
                result = &mut handle => break result,
                Some(line) = self.raw_rx.recv() => self.accept(line),
            }
        };
        self.shared.collector_alive.store(false, Ordering::Relaxed);
        match result {
            Ok(Ok(())) => tracing::debug!(path = %path.display(), "file collector finished"),
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "file collector exited, will recreate")
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "file collector panicked"),
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 파이프라인을 구성하고 필요한 채널을 생성합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    store: Option<Arc<dyn StateStore>>,
    record_rx: Option<mpsc::Receiver<LogRecord>>,
    publication_tx: Option<mpsc::Sender<RulePublication>>,
    locator: Option<LogFileLocator>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            store: None,
            record_rx: None,
            publication_tx: None,
            locator: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 상태 저장소를 지정합니다. 지정하지 않으면 인메모리 저장소를 사용합니다.
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 구조화 로그 레코드 수신 채널을 연결합니다 (`events` 소스).
    pub fn record_receiver(mut self, rx: mpsc::Receiver<LogRecord>) -> Self {
        self.record_rx = Some(rx);
        self
    }

    /// 외부 게시 알림 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn publication_sender(mut self, tx: mpsc::Sender<RulePublication>) -> Self {
        self.publication_tx = Some(tx);
        self
    }

    /// 활성 로그 파일 결정자를 지정합니다.
    ///
    /// 지정하지 않으면 `log_dir`, `log_file_name`, `daily_file_prefix`로 생성합니다.
    pub fn file_locator(mut self, locator: LogFileLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `LogPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<RulePublication>>`: 게시 알림 수신 채널
    ///   (외부 publication_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(LogPipeline, Option<mpsc::Receiver<RulePublication>>), LogPipelineError> {
        self.config.validate()?;

        let (publication_tx, publication_rx) = match self.publication_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.publication_capacity);
                (tx, Some(rx))
            }
        };
        let (clear_tx, clear_rx) = mpsc::channel(64);

        let store = self.store.unwrap_or_else(|| {
            tracing::debug!("no state store configured, using in-memory store");
            Arc::new(MemoryStateStore::new())
        });

        let pipeline = LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            store,
            publication_tx: Some(publication_tx),
            record_rx: self.record_rx,
            clear_tx,
            clear_rx: Some(clear_rx),
            ingest_cancel: CancellationToken::new(),
            cancel: CancellationToken::new(),
            ingest_tasks: Vec::new(),
            processing: None,
            shared: Arc::new(Shared::default()),
            rule_count: 0,
            locator: self.locator,
        };

        Ok((pipeline, publication_rx))
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
