//! CLI error type and exit code mapping

use amtlog_collector::CollectorError;
use amtlog_core::error::AmtlogError;

/// CLI error.
///
/// `exit_code()` maps each variant to the process exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// One or more rule files failed to load or compile.
    #[error("rule error: {0}")]
    Rule(String),

    /// The ledger database is missing or unreadable.
    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Core(#[from] AmtlogError),

    #[error("{0}")]
    Collector(#[from] CollectorError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 1    | General / command error  |
    /// | 2    | Configuration error      |
    /// | 3    | Invalid rules            |
    /// | 4    | Ledger unavailable       |
    /// | 10   | IO error                 |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Core(AmtlogError::Config(_)) => 2,
            Self::Rule(_) => 3,
            Self::Ledger(_) => 4,
            Self::Collector(e) if e.is_ledger_error() => 4,
            Self::Io(_) => 10,
            Self::Command(_) | Self::JsonSerialize(_) | Self::Core(_) | Self::Collector(_) => 1,
        }
    }
}
