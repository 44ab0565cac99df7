//! 파일 기반 로그 수집기
//!
//! 로그 파일을 주기적으로 폴링하며 추가된 바이트를 읽어 완성된 라인을 전달합니다.
//! `tail -f`와 유사한 동작을 비동기 방식으로 구현합니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (Unix)
//! - 파일 크기 축소 감지 (truncation)
//!
//! 두 경우 모두 오프셋 0부터 다시 읽습니다. 날짜 변경에 따른 파일 전환은
//! 파이프라인이 [`LogFileLocator`](super::LogFileLocator)로 처리합니다.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{RawLine, SourcePosition};
use crate::error::LogPipelineError;

/// 한 번의 폴링에서 읽을 최대 바이트
const MAX_READ_PER_POLL: u64 = 8 * 1024 * 1024; // 8MB

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct FileCollectorConfig {
    /// 감시할 파일 경로
    pub path: PathBuf,
    /// 폴링 주기
    pub poll_interval: Duration,
    /// 연속 실패 허용 횟수
    pub max_open_retries: u32,
    /// 실패 후 재시도 대기 시간
    pub retry_delay: Duration,
    /// 시작 오프셋 (재시작 시 이어 읽기)
    pub start_offset: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl FileCollectorConfig {
    /// 기본값으로 설정을 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(1000),
            max_open_retries: 5,
            retry_delay: Duration::from_secs(5),
            start_offset: 0,
            max_line_length: 64 * 1024, // 64KB
        }
    }
}

/// 파일 기반 로그 수집기
pub struct FileCollector {
    config: FileCollectorConfig,
    tx: mpsc::Sender<RawLine>,
    /// 다음에 읽을 바이트 오프셋
    offset: u64,
    /// 마지막으로 본 inode (Unix 전용)
    inode: Option<u64>,
    /// 개행을 만나지 못한 미완성 라인
    partial: BytesMut,
    source: String,
    lines_read: u64,
}

impl FileCollector {
    /// 새 파일 수집기를 생성합니다.
    pub fn new(config: FileCollectorConfig, tx: mpsc::Sender<RawLine>) -> Self {
        let source = format!("file:{}", config.path.display());
        Self {
            offset: config.start_offset,
            config,
            tx,
            inode: None,
            partial: BytesMut::new(),
            source,
            lines_read: 0,
        }
    }

    /// 수집기를 실행합니다.
    ///
    /// 취소되면 진행 중인 읽기를 마치고 EOF까지 한 번 더 읽은 뒤 종료합니다.
    /// 연속 실패가 `max_open_retries`에 도달하면 에러로 종료합니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), LogPipelineError> {
        tracing::info!(
            path = %self.config.path.display(),
            offset = self.offset,
            "starting file collector"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::debug!(
                            path = %self.config.path.display(),
                            error = %e,
                            "final drain read failed"
                        );
                    }
                    break;
                }
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(()) => failures = 0,
                        Err(e @ LogPipelineError::Channel(_)) => return Err(e),
                        Err(e) => {
                            failures += 1;
                            tracing::warn!(
                                path = %self.config.path.display(),
                                attempt = failures,
                                max_attempts = self.config.max_open_retries,
                                error = %e,
                                "failed to read log file"
                            );
                            if failures >= self.config.max_open_retries {
                                return Err(LogPipelineError::Collector {
                                    source_type: "file".to_owned(),
                                    reason: format!(
                                        "{}: giving up after {failures} attempts: {e}",
                                        self.config.path.display()
                                    ),
                                });
                            }
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(self.config.retry_delay) => {}
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(
            path = %self.config.path.display(),
            lines = self.lines_read,
            "file collector stopped"
        );
        Ok(())
    }

    /// 추가된 바이트를 읽어 완성된 라인을 전송합니다.
    async fn poll_once(&mut self) -> Result<(), LogPipelineError> {
        let path = self.config.path.clone();
        let metadata = tokio::fs::metadata(&path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let inode = metadata.ino();
            if self.inode.is_some_and(|prev| prev != inode) {
                tracing::info!(path = %path.display(), "log file replaced, reading from start");
                self.reset();
            }
            self.inode = Some(inode);
        }

        let len = metadata.len();
        if len < self.offset {
            tracing::info!(
                path = %path.display(),
                offset = self.offset,
                len,
                "log file truncated, reading from start"
            );
            self.reset();
        }
        if len == self.offset {
            return Ok(());
        }

        let mut file = tokio::fs::File::open(&path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let want = (len - self.offset).min(MAX_READ_PER_POLL);
        let mut chunk = Vec::with_capacity(usize::try_from(want).unwrap_or(0));
        let read = file.take(want).read_to_end(&mut chunk).await?;

        self.partial.extend_from_slice(&chunk);
        self.offset += read as u64;
        self.emit_lines().await
    }

    /// 버퍼의 완성된 라인을 전송합니다.
    async fn emit_lines(&mut self) -> Result<(), LogPipelineError> {
        // partial[0]의 파일 오프셋
        let mut base = self.offset - self.partial.len() as u64;

        loop {
            let line = match self.partial.iter().position(|&b| b == b'\n') {
                Some(idx) => self.partial.split_to(idx + 1),
                None if self.partial.len() > self.config.max_line_length => {
                    tracing::warn!(
                        path = %self.config.path.display(),
                        max = self.config.max_line_length,
                        "line exceeds maximum length, emitting without newline"
                    );
                    self.partial.split()
                }
                None => break,
            };
            base += line.len() as u64;

            let mut data = line.freeze();
            while data.last().is_some_and(|&b| b == b'\n' || b == b'\r') {
                data.truncate(data.len() - 1);
            }
            if data.is_empty() {
                continue;
            }

            let raw = RawLine::new(data, self.source.clone()).with_position(SourcePosition {
                path: self.config.path.display().to_string(),
                offset: base,
            });
            self.tx
                .send(raw)
                .await
                .map_err(|e| LogPipelineError::Channel(e.to_string()))?;
            self.lines_read += 1;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.partial.clear();
    }
}
