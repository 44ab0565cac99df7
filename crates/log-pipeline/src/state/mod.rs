//! 상태 저장소 -- 룰 히스토리, clear 마커, 수집 위치를 영속화합니다.
//!
//! [`StateStore`]는 `dyn` 호환 trait이며 [`BoxFuture`]를 반환합니다.
//!
//! # 키 규칙
//! - `<id>.log`: 개행으로 연결된 히스토리
//! - `<id>.json`: JSON 행 배열
//! - `<id>.jsonCount`: JSON 행 수
//! - `<id>.clear`: clear 요청 (`"true"`이면 수정 시각이 마커)
//! - `_source.position`: 파일 수집기의 마지막 커밋 위치

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use logsieve_core::error::StateError;
use logsieve_core::pipeline::BoxFuture;

/// 수집 위치 키
pub const SOURCE_POSITION_KEY: &str = "_source.position";

/// 저장된 값과 마지막 수정 시각
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateValue {
    /// 값
    pub value: String,
    /// 마지막 수정 시각 (로컬 시각)
    pub modified_at: NaiveDateTime,
}

impl StateValue {
    /// 현재 시각으로 값을 생성합니다.
    pub fn now(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            modified_at: chrono::Local::now().naive_local(),
        }
    }
}

/// 키-값 상태 저장소
pub trait StateStore: Send + Sync {
    /// 값을 조회합니다.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StateValue>, StateError>>;

    /// 값을 기록합니다. 수정 시각은 호출 시점입니다.
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StateError>>;

    /// 변경 사항을 영속화합니다.
    fn flush(&self) -> BoxFuture<'_, Result<(), StateError>>;
}

/// 룰 히스토리 키
pub fn log_key(rule_id: &str) -> String {
    format!("{rule_id}.log")
}

/// 룰 JSON 키
pub fn json_key(rule_id: &str) -> String {
    format!("{rule_id}.json")
}

/// 룰 JSON 행 수 키
pub fn json_count_key(rule_id: &str) -> String {
    format!("{rule_id}.jsonCount")
}

/// 룰 clear 키
pub fn clear_key(rule_id: &str) -> String {
    format!("{rule_id}.clear")
}

/// clear 값에서 마커를 얻습니다.
///
/// 값이 `"true"`일 때만 수정 시각이 마커가 됩니다.
pub fn clear_marker(value: Option<&StateValue>) -> Option<NaiveDateTime> {
    value
        .filter(|v| v.value == "true")
        .map(|v| v.modified_at)
}
