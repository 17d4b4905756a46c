//! 수집기 에러 타입
//!
//! [`CollectorError`]는 수집기 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<CollectorError> for AmtlogError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use amtlog_core::error::{
    AmtlogError, ConfigError, DeliveryError, InputError, LedgerError, PipelineError, RuleError,
};

/// 수집기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// 파일 또는 디렉토리 없음
    #[error("not found: {path}")]
    NotFound {
        /// 대상 경로
        path: String,
    },

    /// 감시 대상이 디렉토리가 아님
    #[error("not a directory: {path}")]
    NotADirectory {
        /// 대상 경로
        path: String,
    },

    /// BOM 제거 후 행이 하나도 없음
    #[error("empty input: {path}")]
    EmptyInput {
        /// 대상 경로
        path: String,
    },

    /// 디코딩 불가 또는 필수 필드 누락
    #[error("malformed input: {path}: {reason}")]
    MalformedInput {
        /// 대상 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 사용자 정의 규칙 오류 (정규식/조건식 컴파일 또는 평가 실패)
    #[error("rule config error: rule '{rule}': {reason}")]
    RuleConfig {
        /// 규칙 이름
        rule: String,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 싱크 전송 실패
    #[error("delivery error: {sink}: {reason}")]
    Delivery {
        /// 싱크 이름 (vector, syslog)
        sink: String,
        /// 실패 사유
        reason: String,
    },

    /// 원장 저장소 에러
    #[error("ledger error: {0}")]
    Ledger(#[from] sqlx::Error),

    /// 전송 시도 기록 없이 실패를 기록하려 함
    #[error("no ledger record for task '{task_id}'")]
    LedgerRecordMissing {
        /// 태스크 ID
        task_id: String,
    },

    /// 디렉토리 감시 에러
    #[error("watch error: {0}")]
    Watch(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    /// 해당 태스크만 버리면 되는 입력 에러인지 여부
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::EmptyInput { .. } | Self::MalformedInput { .. }
        )
    }

    /// 프로세스를 중단해야 하는 원장 에러인지 여부
    pub fn is_ledger_error(&self) -> bool {
        matches!(self, Self::Ledger(_))
    }
}

impl From<InputError> for CollectorError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::NotFound { path } => Self::NotFound { path },
            InputError::NotADirectory { path } => Self::NotADirectory { path },
            InputError::Empty { path } => Self::EmptyInput { path },
            InputError::Malformed { path, reason } => Self::MalformedInput { path, reason },
        }
    }
}

impl From<CollectorError> for AmtlogError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::NotFound { path } => InputError::NotFound { path }.into(),
            CollectorError::NotADirectory { path } => InputError::NotADirectory { path }.into(),
            CollectorError::EmptyInput { path } => InputError::Empty { path }.into(),
            CollectorError::MalformedInput { path, reason } => {
                InputError::Malformed { path, reason }.into()
            }
            CollectorError::RuleConfig { rule, reason } => RuleError::Invalid { rule, reason }.into(),
            CollectorError::RuleLoad { path, reason } => RuleError::Load { path, reason }.into(),
            CollectorError::Delivery { sink, reason } => DeliveryError::Failed { sink, reason }.into(),
            CollectorError::Ledger(e) => LedgerError::Query(e.to_string()).into(),
            CollectorError::LedgerRecordMissing { task_id } => {
                LedgerError::RecordMissing { task_id }.into()
            }
            CollectorError::Watch(reason) => PipelineError::Watch(reason).into(),
            CollectorError::Config { field, reason } => {
                ConfigError::InvalidValue { field, reason }.into()
            }
            CollectorError::Io(e) => AmtlogError::Io(e),
        }
    }
}
