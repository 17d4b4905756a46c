//! amtlog 수집기 -- 트랜스코딩 로그 쌍을 감지하고, 파싱/분류하여, 두 싱크로 한 번씩 전송합니다.
//!
//! # 모듈 구성
//!
//! - [`watcher`]: 디렉토리 생성 이벤트 감시, `(txt, json)` 쌍 감지
//! - [`parser`]: 텍스트 로그/메타데이터 파싱, 통합 이벤트 생성, 상태 분류
//! - [`rule`]: 운영자 정의 치명 규칙 (정규식, 안전한 조건식)
//! - [`sender`]: HTTP/syslog 싱크와 전송 코디네이터
//! - [`ledger`]: SQLite 전송 원장 (싱크별 성공 여부, 재시도 횟수)
//! - [`processor`]: 태스크 하나의 파싱 → 전송 → 원장 기록
//! - [`retry`]: 재시도 스윕, 보존 기간 스윕
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 수집기 실행 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! PairWatcher -> TaskProcessor -> LogParser + RuleEngine -> DeliveryCoordinator -> Vector / syslog
//!                      |                                                              |
//!                      +----------------------------> Ledger <--------- retry sweep --+
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod processor;
pub mod retry;

pub mod parser;
pub mod rule;
pub mod sender;
pub mod watcher;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{CollectorPipeline, CollectorPipelineBuilder, CollectorProcessor};

// 설정
pub use config::{CollectorConfig, CollectorConfigBuilder};

// 에러
pub use error::CollectorError;

// 파서
pub use parser::{LogParser, MetadataRecord, TextLogResult};

// 규칙 엔진
pub use rule::{RuleEngine, RuleLoader, evaluate_custom_rule};

// 전송
pub use sender::{
    DeliveryCoordinator, DeliveryOutcome, DeliveryPlan, EventSink, SyslogSender, VectorSender,
};

// 원장
pub use ledger::{Ledger, LedgerRecord, LedgerStats};

// 처리기
pub use processor::{ProcessReport, TaskProcessor};
pub use retry::{RetryPolicy, RetrySweepReport};

// 감지기
pub use watcher::{FilePair, PairHandler, PairWatcher, PairWatcherConfig};
