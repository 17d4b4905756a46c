//! 태스크 처리기 -- 파싱, 통합, 전송, 원장 기록을 한 태스크 단위로 수행합니다.
//!
//! ```text
//! FilePair -> parse_text + parse_metadata -> integrate
//!          -> ledger.is_delivered (싱크별) -> coordinator.send_planned
//!          -> ledger.record_attempt -> (실패 시) ledger.record_failure
//! ```
//!
//! # 에러 정책
//! - 입력 에러: 해당 태스크만 버리고 기록합니다.
//! - 전송 에러: 원장에 실패로 기록하고 재시도 스윕에 맡깁니다.
//! - 원장 에러: 전송 기록을 신뢰할 수 없으므로 치명 토큰을 취소합니다.

use std::path::Path;
use std::time::Instant;

use amtlog_core::metrics as m;
use amtlog_core::types::{EventStatus, Severity, SinkKind};
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;
use crate::ledger::Ledger;
use crate::parser::LogParser;
use crate::sender::{DeliveryCoordinator, DeliveryPlan, EventSink};
use crate::watcher::{FilePair, PairHandler};

/// 태스크 하나의 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub task_id: String,
    pub status: EventStatus,
    pub severity: Severity,
    pub vector_ok: bool,
    pub syslog_ok: bool,
    /// 실패가 기록된 경우 증가된 재시도 횟수
    pub retry_count: Option<u32>,
    /// 두 싱크 모두 이미 전송되어 아무것도 보내지 않음
    pub already_delivered: bool,
}

/// 태스크 처리기
pub struct TaskProcessor<V, S> {
    parser: LogParser,
    coordinator: DeliveryCoordinator<V, S>,
    ledger: Ledger,
    environment: String,
    host: String,
    fatal: CancellationToken,
}

impl<V: EventSink, S: EventSink> TaskProcessor<V, S> {
    pub fn new(
        parser: LogParser,
        coordinator: DeliveryCoordinator<V, S>,
        ledger: Ledger,
        environment: impl Into<String>,
        host: impl Into<String>,
        fatal: CancellationToken,
    ) -> Self {
        Self {
            parser,
            coordinator,
            ledger,
            environment: environment.into(),
            host: host.into(),
            fatal,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn parser(&self) -> &LogParser {
        &self.parser
    }

    /// 원장 에러로 취소되는 토큰
    pub fn fatal_token(&self) -> &CancellationToken {
        &self.fatal
    }

    /// 한 태스크를 처리합니다.
    ///
    /// # Errors
    /// 입력 에러와 원장 에러를 그대로 반환합니다. 전송 실패는 에러가 아니라
    /// 원장 기록과 [`ProcessReport`]로 보고됩니다.
    pub async fn process(
        &self,
        text_path: &Path,
        metadata_path: &Path,
    ) -> Result<ProcessReport, CollectorError> {
        let started = Instant::now();

        let metadata = self.parser.parse_metadata(metadata_path).await?;
        let text = self.parser.parse_text(text_path).await?;
        let event = self.parser.integrate(&text, &metadata, &self.environment, &self.host);
        let task_id = event.task_id.as_str().to_owned();

        let vector_done = self.ledger.is_delivered(&task_id, SinkKind::Vector).await?;
        let syslog_done = self.ledger.is_delivered(&task_id, SinkKind::Syslog).await?;
        let plan = DeliveryPlan::skip_delivered(vector_done, syslog_done);

        let mut report = ProcessReport {
            task_id: task_id.clone(),
            status: event.labels.status,
            severity: event.labels.severity,
            vector_ok: true,
            syslog_ok: true,
            retry_count: None,
            already_delivered: plan.is_empty(),
        };
        if report.already_delivered {
            tracing::info!(task_id = %task_id, "already delivered to every sink, skipping");
            return Ok(report);
        }

        let outcome = self.coordinator.send_planned(&event, plan).await;
        report.vector_ok = outcome.vector_ok;
        report.syslog_ok = outcome.syslog_ok;

        let file_path = metadata_path.display().to_string();
        self.ledger
            .record_attempt(&task_id, &file_path, outcome.vector_ok, outcome.syslog_ok)
            .await?;
        if let Some(message) = outcome.error_message() {
            let retry_count = self.ledger.record_failure(&task_id, &message).await?;
            tracing::warn!(task_id = %task_id, retry_count, error = %message, "delivery incomplete, queued for retry");
            report.retry_count = Some(retry_count);
        }

        metrics::counter!(m::PARSER_TASKS_PROCESSED_TOTAL, m::LABEL_STATUS => event.labels.status.as_str())
            .increment(1);
        metrics::histogram!(m::PARSER_PROCESSING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            task_id = %task_id,
            program = %event.program_name,
            status = %event.labels.status,
            severity = %event.labels.severity,
            vector_ok = outcome.vector_ok,
            syslog_ok = outcome.syslog_ok,
            "task processed"
        );
        Ok(report)
    }

    /// 에러를 정책에 따라 분류합니다. 입력 에러는 `Ok(())`로 삼킵니다.
    fn triage(&self, task_id: &str, result: Result<ProcessReport, CollectorError>) -> Result<(), CollectorError> {
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_input_error() => {
                metrics::counter!(m::PARSER_INPUT_ERRORS_TOTAL).increment(1);
                tracing::warn!(task_id, error = %e, "input error, task dropped");
                Ok(())
            }
            Err(e) if e.is_ledger_error() => {
                tracing::error!(task_id, error = %e, "ledger unavailable, stopping collector");
                self.fatal.cancel();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

impl<V, S> PairHandler for TaskProcessor<V, S>
where
    V: EventSink + 'static,
    S: EventSink + 'static,
{
    async fn handle(&self, pair: FilePair) -> Result<(), CollectorError> {
        let result = self.process(&pair.text_path, &pair.metadata_path).await;
        self.triage(&pair.stem, result)
    }
}
