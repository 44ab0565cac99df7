//! 로그 이벤트 수신기
//!
//! 데몬이나 임베딩 애플리케이션이 조립한 `tokio::mpsc` 채널을 통해
//! 구조화된 [`LogRecord`]를 수신하고, 파서가 처리할 수 있는
//! 로그 파일 라인 형식의 [`RawLine`]으로 변환합니다.

use logsieve_core::types::LogRecord;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::RawLine;
use crate::error::LogPipelineError;

/// 이벤트 소스 식별자
pub const EVENT_SOURCE: &str = "events";

/// 로그 이벤트 수신기
pub struct EventReceiver {
    /// LogRecord 수신 채널
    record_rx: mpsc::Receiver<LogRecord>,
    /// 변환된 RawLine 전송 채널
    tx: mpsc::Sender<RawLine>,
    /// 수신한 레코드 카운터
    received_count: u64,
}

impl EventReceiver {
    /// 새 이벤트 수신기를 생성합니다.
    ///
    /// # Arguments
    /// - `record_rx`: 외부에서 전달받은 LogRecord 수신 채널
    /// - `tx`: 파이프라인 내부의 RawLine 전송 채널
    pub fn new(record_rx: mpsc::Receiver<LogRecord>, tx: mpsc::Sender<RawLine>) -> Self {
        Self {
            record_rx,
            tx,
            received_count: 0,
        }
    }

    /// 수신기를 실행합니다.
    ///
    /// 송신 측 채널이 닫히거나 cancellation token이 발동되면 종료됩니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), LogPipelineError> {
        tracing::info!("starting log event receiver");

        loop {
            tokio::select! {
                result = self.record_rx.recv() => {
                    match result {
                        Some(record) => {
                            let raw = Self::record_to_raw_line(&record);
                            if let Err(e) = self.tx.send(raw).await {
                                tracing::error!(error = %e, "failed to forward log record to pipeline");
                                return Err(LogPipelineError::Channel(e.to_string()));
                            }
                            self.received_count += 1;
                        }
                        None => {
                            tracing::info!("log record channel closed, shutting down event receiver");
                            break;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!(received = self.received_count, "event receiver received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }

    /// LogRecord를 로그 파일 라인 형식의 RawLine으로 변환합니다.
    fn record_to_raw_line(record: &LogRecord) -> RawLine {
        RawLine::new(record.to_line(), EVENT_SOURCE)
    }

}
