//! logsieve 공통 크레이트
//!
//! 로그 파이프라인, 데몬, CLI가 함께 사용하는 타입과 trait, 에러, 설정을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `logsieve.toml` 파싱 및 환경변수 오버라이드
//! - [`error`]: 도메인별 에러 계층
//! - [`pipeline`]: 파이프라인 생명주기 trait과 헬스 상태
//! - [`types`]: 로그 레벨, 파싱된 엔트리, 구조화 로그 레코드
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogsieveError, PipelineError, StateError};

// 설정
pub use config::LogsieveConfig;

// 파이프라인 trait
pub use pipeline::{BoxFuture, HealthStatus, Pipeline};

// 도메인 타입
pub use types::{LogLevel, LogRecord, ParsedEntry};
