//! logsieve 로그 파이프라인
//!
//! 호스트 애플리케이션의 로그 스트림을 받아 정규화하고, 사용자 정의 필터 룰에 따라
//! 라인을 분류한 뒤 룰마다 평문/JSON 히스토리를 갱신하여 게시합니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 원시 라인 수집 (일별 로그 파일 tail, 구조화 로그 레코드 수신)
//! - [`buffer`]: 처리 주기 사이의 인메모리 라인 버퍼
//! - [`normalizer`]: 전역 블랙리스트, 공백/제어 문자 정리
//! - [`parser`]: `<timestamp> - <level>: <source> <message>` 라인 파싱
//! - [`rule`]: YAML 필터 룰, 용어 매처, 필터 엔진
//! - [`merge`]: 동일 메시지 병합 (`[N entries]` 접두사)
//! - [`history`]: 크기 제한 평문/JSON 히스토리 투영
//! - [`state`]: 룰 히스토리 상태 저장소
//! - [`processor`]: 처리 주기 실행기
//! - [`trigger`]: 룰 clear 요청
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Collectors -> Buffer -> Normalizer -> Parser -> FilterEngine -> Merge -> History -> StateStore
//!     |                      |                        |                       |
//!  File/Events          blacklist/trim           YAML rules            max lines + clear
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod history;
pub mod merge;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod trigger;

pub mod collector;
pub mod rule;
pub mod state;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder, PipelineStats};

// 설정
pub use config::{DropPolicy, PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 라인 처리
pub use history::{HistoryProjector, Projection};
pub use merge::MergeEngine;
pub use normalizer::LineNormalizer;
pub use parser::LineParser;
pub use processor::{CycleProcessor, CycleReport, RulePublication};

// 필터 룰
pub use rule::{FilterEngine, FilterRule, RuleBuffers, RuleLoader};

// 수집기
pub use collector::{LogFileLocator, RawLine, SourcePosition};

// 상태 저장소
pub use state::{FileStateStore, MemoryStateStore, StateStore, StateValue};

// clear 트리거
pub use trigger::{ClearHandle, TriggerDirWatcher, request_clear};

// 버퍼
pub use buffer::LogBuffer;
