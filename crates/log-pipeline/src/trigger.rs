//! clear 트리거 -- 룰의 JSON 뷰를 현재 시각 기준으로 초기화하는 요청 채널
//!
//! - [`ClearHandle`]: 복제 가능한 요청 송신자
//! - [`TriggerDirWatcher`]: 트리거 디렉토리를 폴링하여 파일 이름(룰 ID)을 요청으로 전달
//! - [`request_clear`]: 트리거 파일을 생성 (CLI `clear` 명령)
//!
//! 처리 태스크는 요청을 받으면 `<id>.clear = "true"`를 기록하고
//! 해당 룰의 재구성 전용 주기를 즉시 실행합니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LogPipelineError;

/// clear 요청 송신자
#[derive(Debug, Clone)]
pub struct ClearHandle {
    tx: mpsc::Sender<String>,
}

impl ClearHandle {
    /// 송신 채널로 핸들을 생성합니다.
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// 룰 clear를 요청합니다.
    pub async fn clear(&self, rule_id: impl Into<String>) -> Result<(), LogPipelineError> {
        self.tx
            .send(rule_id.into())
            .await
            .map_err(|e| LogPipelineError::Channel(e.to_string()))
    }
}

/// 룰 ID로 쓸 수 있는 파일 이름인지 확인합니다.
fn is_rule_id(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 트리거 파일을 생성합니다.
pub async fn request_clear(
    dir: impl AsRef<Path>,
    rule_id: &str,
) -> Result<PathBuf, LogPipelineError> {
    if !is_rule_id(rule_id) {
        return Err(LogPipelineError::UnknownRule(rule_id.to_owned()));
    }
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(rule_id);
    tokio::fs::write(&path, b"").await?;
    Ok(path)
}

/// 트리거 디렉토리 감시자
pub struct TriggerDirWatcher {
    dir: PathBuf,
    poll_interval: Duration,
    handle: ClearHandle,
}

impl TriggerDirWatcher {
    /// 새 감시자를 생성합니다.
    pub fn new(dir: impl Into<PathBuf>, poll_interval: Duration, handle: ClearHandle) -> Self {
        Self {
            dir: dir.into(),
            poll_interval,
            handle,
        }
    }

    /// 취소될 때까지 디렉토리를 폴링합니다.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), LogPipelineError> {
        tracing::info!(dir = %self.dir.display(), "starting clear trigger watcher");
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.scan().await {
                        Ok(_) => {}
                        Err(LogPipelineError::Channel(reason)) => {
                            return Err(LogPipelineError::Channel(reason));
                        }
                        Err(e) => {
                            tracing::debug!(dir = %self.dir.display(), error = %e, "trigger scan failed");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// 트리거 파일을 소비하고 전달한 요청 수를 반환합니다.
    pub async fn scan(&self) -> Result<usize, LogPipelineError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut forwarded = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_rule_id(name) || !entry.file_type().await?.is_file() {
                continue;
            }
            tokio::fs::remove_file(&path).await?;
            tracing::info!(rule_id = %name, "clear requested via trigger file");
            self.handle.clear(name).await?;
            forwarded += 1;
        }
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clear_handle_forwards_rule_id() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ClearHandle::new(tx);
        handle.clone().clear("warn").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("warn"));
    }

    #[tokio::test]
    async fn clear_on_closed_channel_fails() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let result = ClearHandle::new(tx).clear("warn").await;
        assert!(matches!(result, Err(LogPipelineError::Channel(_))));
    }

    #[tokio::test]
    async fn scan_consumes_trigger_files() {
        let dir = tempfile::tempdir().unwrap();
        request_clear(dir.path(), "warn").await.unwrap();
        std::fs::write(dir.path().join("not.a.rule"), "").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let watcher = TriggerDirWatcher::new(dir.path(), Duration::from_millis(10), ClearHandle::new(tx));
        assert_eq!(watcher.scan().await.unwrap(), 1);
        assert_eq!(rx.recv().await.as_deref(), Some("warn"));
        assert!(!dir.path().join("warn").exists());
        assert!(dir.path().join("not.a.rule").exists());
        assert_eq!(watcher.scan().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scan_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let watcher = TriggerDirWatcher::new(
            dir.path().join("missing"),
            Duration::from_millis(10),
            ClearHandle::new(tx),
        );
        assert_eq!(watcher.scan().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn request_clear_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        assert!(request_clear(dir.path(), "../etc").await.is_err());
        assert!(request_clear(dir.path(), "").await.is_err());
    }

    #[tokio::test]
    async fn watcher_runs_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let watcher = TriggerDirWatcher::new(dir.path(), Duration::from_millis(10), ClearHandle::new(tx));
        let task = tokio::spawn(watcher.run(cancel.clone()));

        request_clear(dir.path(), "info").await.unwrap();
        let id = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("info"));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
