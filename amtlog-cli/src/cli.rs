//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no I/O happens here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// amtlog -- offline tooling for the transcoding log collector.
///
/// Use `amtlog <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "amtlog", version, about, long_about = None)]
pub struct Cli {
    /// Path to the amtlog.toml configuration file.
    #[arg(short, long, global = true, default_value = "/etc/amtlog/amtlog.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and validate configuration.
    Config(ConfigArgs),

    /// List and validate critical rules.
    Rules(RulesArgs),

    /// Parse one task offline and print the event that would be sent.
    Parse(ParseArgs),

    /// Inspect and maintain the delivery ledger.
    Ledger(LedgerArgs),
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Load the file, apply env overrides and validate every field.
    Validate,

    /// Print the effective configuration (secrets redacted).
    Show {
        /// Only show one section.
        #[arg(long, value_enum)]
        section: Option<ConfigSection>,
    },
}

/// Top-level sections of `amtlog.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigSection {
    General,
    Watcher,
    Parser,
    Vector,
    Syslog,
    Ledger,
    Metrics,
}

impl ConfigSection {
    pub fn name(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Watcher => "watcher",
            Self::Parser => "parser",
            Self::Vector => "vector",
            Self::Syslog => "syslog",
            Self::Ledger => "ledger",
            Self::Metrics => "metrics",
        }
    }
}

// ---- rules ----

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List inline and directory rules from the configuration.
    List,

    /// Validate rule files (defaults to `parser.rule_dir`).
    Validate {
        /// Rule file or directory.
        path: Option<PathBuf>,
    },
}

// ---- parse ----

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Metadata JSON file of the task.
    pub metadata: PathBuf,

    /// Text log of the task (defaults to the metadata path with `.txt`).
    #[arg(long)]
    pub text: Option<PathBuf>,
}

// ---- ledger ----

#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub action: LedgerAction,
}

#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// Show delivery counts.
    Status,

    /// List records still waiting for a retry.
    Pending {
        /// Maximum number of records to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete records older than the retention period.
    Sweep {
        /// Retention in days (defaults to `ledger.retention_days`).
        #[arg(long)]
        days: Option<u32>,
    },
}
