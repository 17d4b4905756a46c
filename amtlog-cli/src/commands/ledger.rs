//! `amtlog ledger` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use amtlog_collector::{Ledger, LedgerRecord, LedgerStats};
use amtlog_core::config::AmtlogConfig;

use crate::cli::{LedgerAction, LedgerArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `ledger` command.
pub async fn execute(
    args: LedgerArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = AmtlogConfig::load(config_path).await?;
    let ledger = open_existing(&config.ledger.path).await?;
    let max_retry = config.vector.retry_max;

    let result = match args.action {
        LedgerAction::Status => {
            let report = status(&ledger, &config.ledger.path, max_retry).await;
            report.and_then(|r| writer.render(&r))
        }
        LedgerAction::Pending { limit } => {
            let report = pending(&ledger, max_retry, limit).await;
            report.and_then(|r| writer.render(&r))
        }
        LedgerAction::Sweep { days } => {
            let days = days.unwrap_or(config.ledger.retention_days);
            let report = sweep(&ledger, days).await;
            report.and_then(|r| writer.render(&r))
        }
    };

    ledger.close().await;
    result
}

/// Open the ledger without creating it. A typo in `ledger.path` must not
/// leave an empty database behind.
pub async fn open_existing(path: &str) -> Result<Ledger, CliError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(CliError::Ledger(format!("ledger database not found: {path}")));
    }
    info!(path, "opening ledger");
    Ledger::open(path)
        .await
        .map_err(|e| CliError::Ledger(e.to_string()))
}

pub async fn status(ledger: &Ledger, path: &str, max_retry: u32) -> Result<LedgerStatusReport, CliError> {
    Ok(LedgerStatusReport {
        path: path.to_owned(),
        max_retry,
        stats: ledger.stats(max_retry).await?,
    })
}

pub async fn pending(
    ledger: &Ledger,
    max_retry: u32,
    limit: usize,
) -> Result<PendingReport, CliError> {
    let mut records = ledger.list_retryable(max_retry).await?;
    let total = records.len();
    records.truncate(limit);
    Ok(PendingReport { total, records })
}

pub async fn sweep(ledger: &Ledger, retention_days: u32) -> Result<SweepReport, CliError> {
    let deleted = ledger.sweep_expired(retention_days).await?;
    info!(deleted, retention_days, "ledger sweep finished");
    Ok(SweepReport {
        retention_days,
        deleted,
    })
}

#[derive(Serialize)]
pub struct LedgerStatusReport {
    pub path: String,
    pub max_retry: u32,
    #[serde(flatten)]
    pub stats: LedgerStats,
}

impl Render for LedgerStatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Ledger: {}", self.path.bold())?;
        writeln!(w, "  Total:      {}", self.stats.total)?;
        writeln!(w, "  Delivered:  {}", self.stats.delivered.to_string().green())?;
        writeln!(w, "  Pending:    {}", self.stats.pending)?;
        let exhausted = self.stats.exhausted.to_string();
        let exhausted = if self.stats.exhausted > 0 {
            exhausted.red()
        } else {
            exhausted.normal()
        };
        writeln!(w, "  Exhausted:  {exhausted} (retry_count >= {})", self.max_retry)
    }
}

#[derive(Serialize)]
pub struct PendingReport {
    /// Retryable records before `--limit` was applied.
    pub total: usize,
    pub records: Vec<LedgerRecord>,
}

impl Render for PendingReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Pending deliveries ({} shown, {} total)",
            self.records.len(),
            self.total.to_string().bold()
        )?;
        if self.records.is_empty() {
            return Ok(());
        }
        writeln!(w)?;
        writeln!(
            w,
            "{:<24} {:<7} {:<7} {:<6} {:<20} Last error",
            "Task", "Vector", "Syslog", "Retry", "Updated"
        )?;
        writeln!(w, "{}", "-".repeat(90))?;
        for r in &self.records {
            writeln!(
                w,
                "{:<24} {:<7} {:<7} {:<6} {:<20} {}",
                r.task_id,
                mark(r.vector_sent),
                mark(r.syslog_sent),
                r.retry_count,
                r.updated_at.format("%Y-%m-%d %H:%M:%S"),
                r.last_error.as_deref().unwrap_or("-").red()
            )?;
        }
        Ok(())
    }
}

fn mark(sent: bool) -> &'static str {
    if sent { "ok" } else { "-" }
}

#[derive(Serialize)]
pub struct SweepReport {
    pub retention_days: u32,
    pub deleted: u64,
}

impl Render for SweepReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Deleted {} record(s) older than {} day(s)",
            self.deleted, self.retention_days
        )
    }
}
