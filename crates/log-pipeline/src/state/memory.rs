//! 인메모리 상태 저장소

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use logsieve_core::error::StateError;
use logsieve_core::pipeline::BoxFuture;

use super::{StateStore, StateValue};

/// 인메모리 상태 저장소 (테스트/임시 실행용)
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    values: Arc<RwLock<HashMap<String, StateValue>>>,
}

impl MemoryStateStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 수정 시각을 지정해 값을 기록합니다.
    pub async fn insert(&self, key: impl Into<String>, value: StateValue) {
        self.values.write().await.insert(key.into(), value);
    }

    /// 저장된 키 수
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// 저장소가 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StateValue>, StateError>> {
        Box::pin(async move { Ok(self.values.read().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StateError>> {
        Box::pin(async move {
            self.values
                .write()
                .await
                .insert(key.to_owned(), StateValue::now(value));
            Ok(())
        })
    }

    fn flush(&self) -> BoxFuture<'_, Result<(), StateError>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStateStore::new();
        assert!(store.get("a.log").await.unwrap().is_none());
        store.set("a.log", "line".to_owned()).await.unwrap();
        let value = store.get("a.log").await.unwrap().unwrap();
        assert_eq!(value.value, "line");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = MemoryStateStore::new();
        let other = store.clone();
        store.set("k", "v".to_owned()).await.unwrap();
        assert!(other.get("k").await.unwrap().is_some());
        other.flush().await.unwrap();
    }
}
