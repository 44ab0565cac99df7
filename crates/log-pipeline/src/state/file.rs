//! 파일 기반 상태 저장소
//!
//! 전체 상태를 하나의 JSON 파일로 보관합니다. 열 때 한 번 읽고,
//! `flush` 시 임시 파일에 쓴 뒤 rename으로 교체합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use logsieve_core::error::StateError;
use logsieve_core::pipeline::BoxFuture;

use super::{StateStore, StateValue};

/// 상태 파일 최대 크기
const MAX_STATE_FILE_SIZE: u64 = 64 * 1024 * 1024; // 64MB

/// 파일 기반 상태 저장소
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    values: RwLock<HashMap<String, StateValue>>,
    dirty: AtomicBool,
}

impl FileStateStore {
    /// 상태 파일을 엽니다. 파일이 없으면 빈 저장소로 시작합니다.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::metadata(&path).await {
            Ok(meta) => {
                if meta.len() > MAX_STATE_FILE_SIZE {
                    return Err(StateError::Read {
                        key: path.display().to_string(),
                        reason: format!(
                            "state file too large: {} bytes (max: {MAX_STATE_FILE_SIZE})",
                            meta.len()
                        ),
                    });
                }
                let bytes = tokio::fs::read(&path).await.map_err(|e| StateError::Read {
                    key: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                serde_json::from_slice(&bytes).map_err(|e| StateError::Read {
                    key: path.display().to_string(),
                    reason: format!("invalid state file: {e}"),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "state file not found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                return Err(StateError::Read {
                    key: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "state loaded");

        Ok(Self {
            path,
            values: RwLock::new(values),
            dirty: AtomicBool::new(false),
        })
    }

    /// 상태 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 저장된 키 목록 (정렬됨)
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn persist(&self) -> Result<(), StateError> {
        let persist_err = |reason: String| StateError::Persist {
            path: self.path.display().to_string(),
            reason,
        };

        let bytes = {
            let values = self.values.read().await;
            serde_json::to_vec_pretty(&*values).map_err(|e| persist_err(e.to_string()))?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persist_err(format!("failed to create directory: {e}")))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| persist_err(format!("temp create failed: {e}")))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| persist_err(format!("temp write failed: {e}")))?;
        // rename 전 임시 파일 fsync
        file.sync_all()
            .await
            .map_err(|e| persist_err(format!("temp fsync failed: {e}")))?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| persist_err(format!("rename failed: {e}")))?;

        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StateValue>, StateError>> {
        Box::pin(async move { Ok(self.values.read().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StateError>> {
        Box::pin(async move {
            self.values
                .write()
                .await
                .insert(key.to_owned(), StateValue::now(value));
            self.dirty.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn flush(&self) -> BoxFuture<'_, Result<(), StateError>> {
        Box::pin(async move {
            if !self.dirty.swap(false, Ordering::AcqRel) {
                return Ok(());
            }
            if let Err(e) = self.persist().await {
                self.dirty.store(true, Ordering::Release);
                return Err(e);
            }
            tracing::debug!(path = %self.path.display(), "state flushed");
            Ok(())
        })
    }
}
