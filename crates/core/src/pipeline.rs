//! 파이프라인 trait -- 모듈 생명주기 정의

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::LogsieveError;

/// `dyn` trait에서 비동기 메서드를 반환하기 위한 박스 Future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 또는 일시적 장애
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 백그라운드 파이프라인 생명주기 trait
///
/// 데몬은 이 trait을 통해 파이프라인을 시작/정지하고 상태를 조회합니다.
///
/// # 생명주기
/// ```text
/// Initialized → start() → Running → stop() → Stopped
/// ```
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다. 백그라운드 태스크를 스폰하고 즉시 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogsieveError>> + Send;

    /// 파이프라인을 정지합니다. 수집원을 먼저 분리한 뒤 남은 데이터를 처리합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogsieveError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(HealthStatus::Unhealthy("down".to_owned()).is_unhealthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_serializes_with_reason() {
        let json = serde_json::to_string(&HealthStatus::Degraded("buffer".to_owned())).unwrap();
        assert_eq!(json, r#"{"status":"degraded","reason":"buffer"}"#);
        let json = serde_json::to_string(&HealthStatus::Healthy).unwrap();
        assert_eq!(json, r#"{"status":"healthy"}"#);
    }

    #[test]
    fn health_status_display() {
        assert_eq!(
            HealthStatus::Unhealthy("stopped".to_owned()).to_string(),
            "unhealthy: stopped"
        );
    }
}
