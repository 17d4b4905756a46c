//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `amtlog_`
//! - 컴포넌트명: `detector_`, `parser_`, `delivery_`, `ledger_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(amtlog_core::metrics::DETECTOR_PAIRS_DETECTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 싱크 레이블 키 (vector, syslog)
pub const LABEL_SINK: &str = "sink";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 이벤트 상태 레이블 키 (success, warning, failed)
pub const LABEL_STATUS: &str = "status";

// ─── Pair Detector 메트릭 ───────────────────────────────────────────

/// Detector: 짝이 맞춰진 태스크 수 (counter)
pub const DETECTOR_PAIRS_DETECTED_TOTAL: &str = "amtlog_detector_pairs_detected_total";

/// Detector: `.txt` 대기 시간 초과 수 (counter)
pub const DETECTOR_PAIR_TIMEOUTS_TOTAL: &str = "amtlog_detector_pair_timeouts_total";

/// Detector: 대기 중 중복 이벤트로 버려진 수 (counter)
pub const DETECTOR_DUPLICATES_DROPPED_TOTAL: &str = "amtlog_detector_duplicates_dropped_total";

/// Detector: 현재 대기 중인 태스크 수 (gauge)
pub const DETECTOR_PENDING_PAIRS: &str = "amtlog_detector_pending_pairs";

// ─── Parser 메트릭 ──────────────────────────────────────────────────

/// Parser: 처리 완료된 태스크 수 (counter, label: status)
pub const PARSER_TASKS_PROCESSED_TOTAL: &str = "amtlog_parser_tasks_processed_total";

/// Parser: 입력 에러로 버려진 태스크 수 (counter)
pub const PARSER_INPUT_ERRORS_TOTAL: &str = "amtlog_parser_input_errors_total";

/// Parser: 평가 실패로 비활성화된 규칙 수 (counter)
pub const PARSER_RULES_DISABLED_TOTAL: &str = "amtlog_parser_rules_disabled_total";

/// Parser: 태스크 하나의 처리 시간 (histogram, 초)
pub const PARSER_PROCESSING_DURATION_SECONDS: &str = "amtlog_parser_processing_duration_seconds";

// ─── Delivery 메트릭 ────────────────────────────────────────────────

/// Delivery: 싱크별 전송 시도 수 (counter, labels: sink, result)
pub const DELIVERY_ATTEMPTS_TOTAL: &str = "amtlog_delivery_attempts_total";

/// Delivery: 재시도 스윕이 다시 전송한 태스크 수 (counter)
pub const DELIVERY_RETRIES_TOTAL: &str = "amtlog_delivery_retries_total";

// ─── Ledger 메트릭 ──────────────────────────────────────────────────

/// Ledger: 보존 기간 스윕으로 삭제된 레코드 수 (counter)
pub const LEDGER_RECORDS_SWEPT_TOTAL: &str = "amtlog_ledger_records_swept_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "amtlog_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "amtlog_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 태스크 처리 시간 히스토그램 버킷 (초)
///
/// 파일 읽기와 두 싱크 전송을 포함하므로 1ms ~ 30s 범위
pub const PROCESSING_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `amtlog-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        DETECTOR_PAIRS_DETECTED_TOTAL,
        "Total number of (json, txt) pairs handed to the processor"
    );
    describe_counter!(
        DETECTOR_PAIR_TIMEOUTS_TOTAL,
        "Total number of tasks whose text log never appeared within the wait timeout"
    );
    describe_counter!(
        DETECTOR_DUPLICATES_DROPPED_TOTAL,
        "Total number of metadata creation events dropped because a wait was already pending"
    );
    describe_gauge!(
        DETECTOR_PENDING_PAIRS,
        "Number of tasks currently waiting for their text log"
    );

    describe_counter!(
        PARSER_TASKS_PROCESSED_TOTAL,
        "Total number of tasks parsed into an integrated event, by status"
    );
    describe_counter!(
        PARSER_INPUT_ERRORS_TOTAL,
        "Total number of tasks dropped because an input artifact was missing or malformed"
    );
    describe_counter!(
        PARSER_RULES_DISABLED_TOTAL,
        "Total number of custom critical rules disabled after an evaluation failure"
    );
    describe_histogram!(
        PARSER_PROCESSING_DURATION_SECONDS,
        "Time to parse, integrate and deliver a single task in seconds"
    );

    describe_counter!(
        DELIVERY_ATTEMPTS_TOTAL,
        "Total number of sink delivery attempts, by sink and result"
    );
    describe_counter!(
        DELIVERY_RETRIES_TOTAL,
        "Total number of tasks re-driven by the retry sweep"
    );

    describe_counter!(
        LEDGER_RECORDS_SWEPT_TOTAL,
        "Total number of ledger records removed by the retention sweep"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "amtlog daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
