//! `amtlog parse` command handler
//!
//! Runs the collector's parser and classifier on one task without touching
//! the ledger or any sink.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use amtlog_collector::{CollectorConfig, LogParser, RuleEngine};
use amtlog_core::config::AmtlogConfig;
use amtlog_core::types::IntegratedEvent;

use crate::cli::ParseArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `parse` command.
pub async fn execute(
    args: ParseArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = AmtlogConfig::load(config_path).await?;
    let text = args
        .text
        .unwrap_or_else(|| args.metadata.with_extension("txt"));
    let report = parse_task(&config, &text, &args.metadata).await?;
    writer.render(&report)
}

/// Parse a `(txt, json)` pair with the configured rules.
pub async fn parse_task(
    config: &AmtlogConfig,
    text_path: &Path,
    metadata_path: &Path,
) -> Result<ParseReport, CliError> {
    info!(text = %text_path.display(), metadata = %metadata_path.display(), "parsing task");

    let rules = Arc::new(RuleEngine::load(&config.parser).await?);
    let parser = LogParser::new(&config.parser, rules)?;

    let text = parser.parse_text(text_path).await?;
    let metadata = parser.parse_metadata(metadata_path).await?;
    let host = CollectorConfig::from_core(config).resolved_host();
    let event = parser.integrate(&text, &metadata, &config.general.environment, &host);

    let mut sinks = Vec::new();
    if config.vector.enabled {
        sinks.push("vector");
    }
    if config.syslog.enabled && event.is_critical() {
        sinks.push("syslog");
    }

    Ok(ParseReport {
        lines_read: text.lines_read,
        truncated: text.truncated,
        sinks,
        event,
    })
}

#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub lines_read: usize,
    pub truncated: bool,
    /// Sinks the daemon would deliver this event to.
    pub sinks: Vec<&'static str>,
    pub event: IntegratedEvent,
}

impl Render for ParseReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let labels = &self.event.labels;
        let status = if self.event.is_critical() {
            labels.status.as_str().red().bold()
        } else {
            labels.status.as_str().green().bold()
        };

        writeln!(w, "Task {}", self.event.task_id.as_str().bold())?;
        writeln!(w, "  Status:      {} ({})", status, labels.severity)?;
        writeln!(w, "  Program:     {}", self.event.program_name)?;
        writeln!(w, "  Encoder:     {} / {}", labels.encoder, self.event.format)?;
        writeln!(w, "  Ratio:       {:.2}", self.event.compression_ratio)?;
        writeln!(w, "  Message:     {}", self.event.message)?;
        if let Some(error) = &self.event.error_message {
            writeln!(w, "  Error:       {}", error.red())?;
        }
        let truncated = if self.truncated { " (truncated)" } else { "" };
        writeln!(w, "  Lines read:  {}{truncated}", self.lines_read)?;
        let sinks = if self.sinks.is_empty() {
            "none".to_owned()
        } else {
            self.sinks.join(", ")
        };
        writeln!(w, "  Sinks:       {sinks}")
    }
}
