//! 전송 원장 -- 태스크별 싱크 전송 여부와 재시도 횟수를 기록하는 SQLite 저장소
//!
//! 하나의 테이블 `processed_logs`에 태스크 ID를 키로 레코드를 둡니다.
//! 모든 쓰기는 태스크 ID 기준의 단일 upsert/update이므로 서로 다른 태스크의
//! 동시 전송은 경합하지 않습니다.
//!
//! 타임스탬프는 UTC `YYYY-MM-DD HH:MM:SS.mmm` 텍스트로 저장되어
//! 문자열 비교가 곧 시간 비교가 됩니다.

use std::path::Path;
use std::time::Duration;

use amtlog_core::types::SinkKind;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::error::CollectorError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 4;

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS processed_logs (
        task_id      TEXT PRIMARY KEY,
        file_path    TEXT NOT NULL,
        processed_at TEXT NOT NULL,
        vector_sent  INTEGER NOT NULL DEFAULT 0,
        syslog_sent  INTEGER NOT NULL DEFAULT 0,
        retry_count  INTEGER NOT NULL DEFAULT 0,
        last_error   TEXT,
        updated_at   TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_processed_logs_processed_at ON processed_logs (processed_at)",
    "CREATE INDEX IF NOT EXISTS idx_processed_logs_updated_at ON processed_logs (updated_at)",
];

/// 원장 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRecord {
    pub task_id: String,
    /// 메타데이터 파일 경로
    pub file_path: String,
    /// 최초 기록 시각
    pub processed_at: DateTime<Utc>,
    pub vector_sent: bool,
    pub syslog_sent: bool,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// 두 싱크 모두 성공했는지 여부
    pub fn is_fully_delivered(&self) -> bool {
        self.vector_sent && self.syslog_sent
    }

    pub fn is_delivered(&self, sink: SinkKind) -> bool {
        match sink {
            SinkKind::Vector => self.vector_sent,
            SinkKind::Syslog => self.syslog_sent,
        }
    }
}

#[derive(FromRow)]
struct LedgerRow {
    task_id: String,
    file_path: String,
    processed_at: String,
    vector_sent: bool,
    syslog_sent: bool,
    retry_count: i64,
    last_error: Option<String>,
    updated_at: String,
}

impl TryFrom<LedgerRow> for LedgerRecord {
    type Error = CollectorError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            processed_at: parse_timestamp(&row.processed_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            task_id: row.task_id,
            file_path: row.file_path,
            vector_sent: row.vector_sent,
            syslog_sent: row.syslog_sent,
            retry_count: clamp_count(row.retry_count),
            last_error: row.last_error,
        })
    }
}

/// 원장 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// 전체 레코드 수
    pub total: u64,
    /// 두 싱크 모두 성공한 레코드 수
    pub delivered: u64,
    /// 하나 이상의 싱크가 실패한 레코드 수
    pub pending: u64,
    /// pending 중 재시도 상한에 도달한 레코드 수
    pub exhausted: u64,
}

/// SQLite 전송 원장
///
/// 내부 풀은 참조 카운트로 공유되므로 `clone()`은 같은 저장소를 가리킵니다.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// 파일 기반 원장을 열고 스키마를 생성합니다. 상위 디렉토리가 없으면 만듭니다.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CollectorError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.init_schema().await?;
        tracing::info!(path = %path.display(), "ledger opened");
        Ok(ledger)
    }

    /// 메모리 원장을 엽니다. 단일 연결을 유지해야 데이터가 보존됩니다.
    pub async fn open_in_memory() -> Result<Self, CollectorError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.init_schema().await?;
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<(), CollectorError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// 해당 싱크로 전송에 성공한 기록이 있는지 확인합니다.
    pub async fn is_delivered(&self, task_id: &str, sink: SinkKind) -> Result<bool, CollectorError> {
        let sql = match sink {
            SinkKind::Vector => "SELECT vector_sent FROM processed_logs WHERE task_id = ?",
            SinkKind::Syslog => "SELECT syslog_sent FROM processed_logs WHERE task_id = ?",
        };
        let sent: Option<bool> = sqlx::query_scalar(sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sent.unwrap_or(false))
    }

    /// 전송 시도 결과를 기록합니다.
    ///
    /// 레코드가 없으면 만들고, 있으면 두 싱크 플래그와 갱신 시각만 덮어씁니다.
    /// `retry_count`는 건드리지 않습니다.
    pub async fn record_attempt(
        &self,
        task_id: &str,
        file_path: &str,
        vector_sent: bool,
        syslog_sent: bool,
    ) -> Result<(), CollectorError> {
        self.record_attempt_at(task_id, file_path, vector_sent, syslog_sent, Utc::now())
            .await
    }

    /// 기록 시각을 지정하여 전송 시도 결과를 기록합니다.
    pub async fn record_attempt_at(
        &self,
        task_id: &str,
        file_path: &str,
        vector_sent: bool,
        syslog_sent: bool,
        at: DateTime<Utc>,
    ) -> Result<(), CollectorError> {
        let now = format_timestamp(at);
        sqlx::query(
            r#"
            INSERT INTO processed_logs (
                task_id, file_path, processed_at, vector_sent, syslog_sent, retry_count, updated_at
            ) VALUES (?, ?, ?, ?, ?, 0, ?)
            ON CONFLICT(task_id) DO UPDATE SET
                vector_sent = excluded.vector_sent,
                syslog_sent = excluded.syslog_sent,
                updated_at  = excluded.updated_at
            "#,
        )
        .bind(task_id)
        .bind(file_path)
        .bind(&now)
        .bind(vector_sent)
        .bind(syslog_sent)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(task_id, vector_sent, syslog_sent, "ledger attempt recorded");
        Ok(())
    }

    /// 실패를 기록하고 증가된 재시도 횟수를 반환합니다.
    ///
    /// # Errors
    /// 먼저 기록된 시도가 없으면 [`CollectorError::LedgerRecordMissing`]
    pub async fn record_failure(
        &self,
        task_id: &str,
        error_message: &str,
    ) -> Result<u32, CollectorError> {
        let now = format_timestamp(Utc::now());
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE processed_logs
            SET retry_count = retry_count + 1,
                last_error  = ?,
                updated_at  = ?
            WHERE task_id = ?
            RETURNING retry_count
            "#,
        )
        .bind(error_message)
        .bind(&now)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        let count = count.ok_or_else(|| CollectorError::LedgerRecordMissing {
            task_id: task_id.to_owned(),
        })?;
        let count = clamp_count(count);
        tracing::debug!(task_id, retry_count = count, "ledger failure recorded");
        Ok(count)
    }

    /// 하나 이상의 싱크가 실패했고 재시도 횟수가 `max_retry` 미만인 레코드를
    /// 오래 갱신되지 않은 순서로 반환합니다.
    pub async fn list_retryable(&self, max_retry: u32) -> Result<Vec<LedgerRecord>, CollectorError> {
        let rows: Vec<LedgerRow> = sqlx::query_as(
            r#"
            SELECT task_id, file_path, processed_at, vector_sent, syslog_sent,
                   retry_count, last_error, updated_at
            FROM processed_logs
            WHERE (vector_sent = 0 OR syslog_sent = 0)
              AND retry_count < ?
            ORDER BY updated_at ASC, task_id ASC
            "#,
        )
        .bind(i64::from(max_retry))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerRecord::try_from).collect()
    }

    /// 보존 기간보다 오래된 레코드를 전송 상태와 무관하게 삭제합니다.
    ///
    /// 기준 시각이 표현 가능한 범위를 벗어나면 아무것도 삭제하지 않습니다.
    pub async fn sweep_expired(&self, retention_days: u32) -> Result<u64, CollectorError> {
        let cutoff = TimeDelta::try_days(i64::from(retention_days))
            .and_then(|age| Utc::now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => self.sweep_before(cutoff).await,
            None => {
                tracing::warn!(retention_days, "retention cutoff out of range, nothing swept");
                Ok(0)
            }
        }
    }

    /// `processed_at`이 `cutoff`보다 이전인 레코드를 삭제합니다.
    pub async fn sweep_before(&self, cutoff: DateTime<Utc>) -> Result<u64, CollectorError> {
        let result = sqlx::query("DELETE FROM processed_logs WHERE processed_at < ?")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        tracing::info!(deleted, cutoff = %cutoff, "ledger retention sweep finished");
        Ok(deleted)
    }

    /// 레코드 존재 여부
    pub async fn contains(&self, task_id: &str) -> Result<bool, CollectorError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM processed_logs WHERE task_id = ?")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// 레코드 조회
    pub async fn get(&self, task_id: &str) -> Result<Option<LedgerRecord>, CollectorError> {
        let row: Option<LedgerRow> = sqlx::query_as(
            r#"
            SELECT task_id, file_path, processed_at, vector_sent, syslog_sent,
                   retry_count, last_error, updated_at
            FROM processed_logs
            WHERE task_id = ?
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerRecord::try_from).transpose()
    }

    /// 재시도 횟수 (레코드가 없으면 `None`)
    pub async fn retry_count(&self, task_id: &str) -> Result<Option<u32>, CollectorError> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT retry_count FROM processed_logs WHERE task_id = ?")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.map(clamp_count))
    }

    /// 전체/완료/대기/소진 레코드 수
    pub async fn stats(&self, max_retry: u32) -> Result<LedgerStats, CollectorError> {
        let (total, delivered, exhausted): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN vector_sent = 1 AND syslog_sent = 1 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN (vector_sent = 0 OR syslog_sent = 0)
                                      AND retry_count >= ? THEN 1 ELSE 0 END), 0)
            FROM processed_logs
            "#,
        )
        .bind(i64::from(max_retry))
        .fetch_one(&self.pool)
        .await?;

        let total = u64::try_from(total).unwrap_or(0);
        let delivered = u64::try_from(delivered).unwrap_or(0);
        Ok(LedgerStats {
            total,
            delivered,
            pending: total.saturating_sub(delivered),
            exhausted: u64::try_from(exhausted).unwrap_or(0),
        })
    }

    /// 연결이 살아 있는지 확인합니다.
    pub async fn ping(&self) -> Result<(), CollectorError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 모든 연결을 닫습니다.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CollectorError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            CollectorError::Ledger(sqlx::Error::Decode(
                format!("invalid ledger timestamp '{value}': {e}").into(),
            ))
        })
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
