//! 에러 타입 — 도메인별 에러 정의
//!
//! 수집기 내부 에러는 다음 분류로 수렴합니다.
//!
//! | 분류 | 의미 | 처리 방침 |
//! |---|---|---|
//! | [`InputError`] | 로그 파일 누락/손상/빈 파일 | 해당 태스크만 버리고 로그 기록 |
//! | [`RuleError`] | 사용자 정의 규칙 설정 오류 | 시작 시점에 보고, 실행 중이면 해당 규칙만 비활성화 |
//! | [`DeliveryError`] | 싱크 전송 실패 | 원장에 실패 기록 후 재시도 대상 |
//! | [`LedgerError`] | 원장 저장소 오류 | 프로세스 치명 오류 |

/// amtlog 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AmtlogError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력 파일 에러
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// 규칙 설정 에러
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// 전송 에러
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// 원장 에러
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 입력 파일 에러
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// 파일 또는 디렉토리가 존재하지 않음
    #[error("not found: {path}")]
    NotFound { path: String },

    /// 디렉토리가 아닌 경로
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// 내용이 비어 있음
    #[error("empty input: {path}")]
    Empty { path: String },

    /// 형식이 잘못됨
    #[error("malformed input {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// 사용자 정의 규칙 에러
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// 규칙 정의 또는 평가 실패
    #[error("rule '{rule}': {reason}")]
    Invalid { rule: String, reason: String },

    /// 규칙 파일 로딩 실패
    #[error("failed to load rules from {path}: {reason}")]
    Load { path: String, reason: String },
}

/// 싱크 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// 전송 실패
    #[error("{sink}: {reason}")]
    Failed { sink: String, reason: String },
}

/// 원장 에러
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// 저장소 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 전송 시도 기록 없이 실패를 기록하려 함
    #[error("no ledger record for task '{task_id}'")]
    RecordMissing { task_id: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 디렉토리 감시 실패
    #[error("watch failed: {0}")]
    Watch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_error_converts_to_top_level() {
        let err: AmtlogError = InputError::Empty {
            path: "/logs/a.txt".to_owned(),
        }
        .into();
        assert!(matches!(err, AmtlogError::Input(InputError::Empty { .. })));
        assert!(err.to_string().contains("/logs/a.txt"));
    }

    #[test]
    fn record_missing_display_names_task() {
        let err = LedgerError::RecordMissing {
            task_id: "2025-10-18_120000.000".to_owned(),
        };
        assert!(err.to_string().contains("2025-10-18_120000.000"));
    }

    #[test]
    fn delivery_error_display_includes_sink() {
        let err = DeliveryError::Failed {
            sink: "vector".to_owned(),
            reason: "HTTP 503".to_owned(),
        };
        assert_eq!(err.to_string(), "vector: HTTP 503");
    }
}
