//! 재시도 스윕과 보존 기간 스윕
//!
//! 재시도 스윕은 원장의 재시도 대상 레코드를 태스크 처리기로 다시 보냅니다.
//! 레코드마다 `base ^ retry_count`초의 지수 백오프가 `updated_at` 이후로 지나야 합니다.
//! 감지기와 같은 [`PendingSet`] 슬롯을 점유하므로 한 태스크가 동시에 두 번 처리되지 않습니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use amtlog_core::config::{LedgerConfig, VectorConfig};
use amtlog_core::metrics as m;
use chrono::{DateTime, Utc};

use crate::error::CollectorError;
use crate::ledger::{Ledger, LedgerRecord};
use crate::processor::TaskProcessor;
use crate::sender::EventSink;
use crate::watcher::{PendingSet, TEXT_EXTENSION};

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 이 횟수에 도달한 레코드는 더 이상 재시도하지 않음
    pub max_retry: u32,
    /// 지수 백오프의 밑 (초)
    pub backoff_base_secs: u64,
}

impl RetryPolicy {
    pub fn from_config(vector: &VectorConfig) -> Self {
        Self {
            max_retry: vector.retry_max,
            backoff_base_secs: vector.retry_backoff_base_secs,
        }
    }

    /// `retry_count`번 실패한 레코드가 기다려야 하는 시간
    pub fn backoff(&self, retry_count: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.checked_pow(retry_count).unwrap_or(u64::MAX))
    }

    /// 백오프가 지났는지 여부
    pub fn is_due(&self, record: &LedgerRecord, now: DateTime<Utc>) -> bool {
        let elapsed = (now - record.updated_at).to_std().unwrap_or_default();
        elapsed >= self.backoff(record.retry_count)
    }
}

/// 재시도 스윕 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySweepReport {
    /// 재시도 대상 레코드 수
    pub candidates: usize,
    /// 다시 처리한 레코드 수
    pub retried: usize,
    /// 백오프가 지나지 않아 건너뛴 수
    pub backing_off: usize,
    /// 원본 파일이 없어 실패로 기록한 수
    pub missing: usize,
    /// 감지기가 처리 중이라 건너뛴 수
    pub in_flight: usize,
}

/// 재시도 대상 레코드를 다시 처리합니다.
///
/// # Errors
/// 원장 에러만 반환합니다. 개별 태스크의 입력 에러는 실패로 기록됩니다.
pub async fn retry_sweep<V: EventSink, S: EventSink>(
    processor: &TaskProcessor<V, S>,
    pending: &PendingSet,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<RetrySweepReport, CollectorError> {
    let ledger = processor.ledger();
    let records = ledger.list_retryable(policy.max_retry).await?;
    let mut report = RetrySweepReport {
        candidates: records.len(),
        ..Default::default()
    };

    for record in records {
        if !policy.is_due(&record, now) {
            report.backing_off += 1;
            continue;
        }

        let Some(_slot) = pending.try_acquire(&record.task_id) else {
            tracing::debug!(task_id = %record.task_id, "task in flight, retry deferred");
            report.in_flight += 1;
            continue;
        };

        let metadata_path = PathBuf::from(&record.file_path);
        let text_path = metadata_path.with_extension(TEXT_EXTENSION);
        if !exists(&metadata_path).await || !exists(&text_path).await {
            let retry_count = ledger
                .record_failure(&record.task_id, "source files no longer exist")
                .await?;
            tracing::warn!(task_id = %record.task_id, retry_count, path = %record.file_path, "retry skipped, source files missing");
            report.missing += 1;
            continue;
        }

        metrics::counter!(m::DELIVERY_RETRIES_TOTAL).increment(1);
        tracing::info!(task_id = %record.task_id, retry_count = record.retry_count, "retrying delivery");
        match processor.process(&text_path, &metadata_path).await {
            Ok(_) => report.retried += 1,
            Err(e) if e.is_ledger_error() => return Err(e),
            Err(e) => {
                let retry_count = ledger.record_failure(&record.task_id, &e.to_string()).await?;
                tracing::warn!(task_id = %record.task_id, retry_count, error = %e, "retry failed");
                report.retried += 1;
            }
        }
    }

    if report.candidates > 0 {
        tracing::info!(
            candidates = report.candidates,
            retried = report.retried,
            backing_off = report.backing_off,
            missing = report.missing,
            in_flight = report.in_flight,
            "retry sweep finished"
        );
    }
    Ok(report)
}

/// 보존 기간이 지난 레코드를 삭제합니다.
pub async fn retention_sweep(ledger: &Ledger, config: &LedgerConfig) -> Result<u64, CollectorError> {
    let deleted = ledger.sweep_expired(config.retention_days).await?;
    metrics::counter!(m::LEDGER_RECORDS_SWEPT_TOTAL).increment(deleted);
    Ok(deleted)
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
