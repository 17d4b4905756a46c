//! amtlog 공통 크레이트
//!
//! 트랜스코딩 로그 수집기의 모든 크레이트가 공유하는 타입과 trait을 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`types`]: 태스크 ID, 로그 수준, 처리 단계, 통합 이벤트
//! - [`error`]: 에러 분류 (입력/규칙/전송/원장)
//! - [`config`]: `amtlog.toml` 설정 및 환경변수 오버라이드
//! - [`pipeline`]: 장기 실행 컴포넌트 생명주기 trait
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    AmtlogError, ConfigError, DeliveryError, InputError, LedgerError, PipelineError, RuleError,
};

// 설정
pub use config::AmtlogConfig;

// 파이프라인 trait
pub use pipeline::{BoxFuture, HealthStatus, Pipeline};

// 도메인 타입
pub use types::{
    ErrorSummary, EventLabels, EventStatus, IntegratedEvent, LogLevel, LogSource, Phase,
    PhaseInfo, PhaseStatus, Severity, SinkKind, TaskId,
};
