//! 로그 수집 모듈 -- 로그 소스에서 원시 라인을 수집합니다.
//!
//! # 수집 소스
//! - [`FileCollector`]: 일별 로그 파일 감시 (tail -f 방식)
//! - [`EventReceiver`]: 구조화된 [`LogRecord`](logsieve_core::types::LogRecord)를 mpsc 채널로 수신
//!
//! # 아키텍처
//! 각 수집기는 자체 tokio 태스크에서 실행되며, 수집된 원시 라인을
//! `tokio::mpsc::Sender<RawLine>` 채널을 통해 처리 태스크로 전달합니다.
//! 활성 파일 경로는 [`LogFileLocator`]가 결정합니다.

pub mod event_receiver;
pub mod file;

pub use event_receiver::EventReceiver;
pub use file::{FileCollector, FileCollectorConfig};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 소스 파일 내 위치
///
/// `offset`은 라인 바로 뒤의 바이트 오프셋입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    /// 파일 경로
    pub path: String,
    /// 바이트 오프셋
    pub offset: u64,
}

/// 수집된 원시 라인
///
/// 수집기가 생성하고 처리 태스크가 한 번 소비합니다.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// 원시 바이트 (개행 제외)
    pub data: Bytes,
    /// 수집 소스 식별자 (예: "file:/opt/iobroker/log/iobroker.2024-01-05.log", "events")
    pub source: String,
    /// 수집 시각
    pub received_at: std::time::SystemTime,
    /// 파일 소스의 위치
    pub position: Option<SourcePosition>,
}

impl RawLine {
    /// 새 RawLine을 생성합니다.
    pub fn new(data: impl Into<Bytes>, source: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            source: source.into(),
            received_at: std::time::SystemTime::now(),
            position: None,
        }
    }

    /// 소스 위치를 설정합니다.
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }

    /// UTF-8로 해석한 텍스트 (잘못된 바이트는 대체 문자)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// 오늘 날짜 공급자
pub type DateSource = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// 활성 로그 파일 경로 결정자
///
/// 고정 파일 이름이 설정되면 `log_dir/log_file_name`,
/// 아니면 `log_dir/<prefix>YYYY-MM-DD.log`를 사용합니다.
#[derive(Clone)]
pub struct LogFileLocator {
    log_dir: PathBuf,
    log_file_name: String,
    daily_prefix: String,
    /// 없으면 로컬 시계
    today: Option<DateSource>,
}

impl fmt::Debug for LogFileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFileLocator")
            .field("log_dir", &self.log_dir)
            .field("log_file_name", &self.log_file_name)
            .field("daily_prefix", &self.daily_prefix)
            .field("custom_date_source", &self.today.is_some())
            .finish()
    }
}

impl LogFileLocator {
    /// 새 결정자를 생성합니다.
    pub fn new(
        log_dir: impl Into<PathBuf>,
        log_file_name: impl Into<String>,
        daily_prefix: impl Into<String>,
    ) -> Self {
        Self {
            log_dir: log_dir.into(),
            log_file_name: log_file_name.into(),
            daily_prefix: daily_prefix.into(),
            today: None,
        }
    }

    /// 로컬 시계 대신 사용할 날짜 공급자를 지정합니다.
    pub fn with_date_source(mut self, today: DateSource) -> Self {
        self.today = Some(today);
        self
    }

    /// 주어진 날짜의 파일 경로
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        if self.log_file_name.is_empty() {
            self.log_dir.join(format!(
                "{}{}.log",
                self.daily_prefix,
                date.format("%Y-%m-%d")
            ))
        } else {
            self.log_dir.join(&self.log_file_name)
        }
    }

    /// 오늘 날짜의 파일 경로
    pub fn current(&self) -> PathBuf {
        let today = match &self.today {
            Some(source) => source(),
            None => chrono::Local::now().date_naive(),
        };
        self.path_for(today)
    }
}
