//! `amtlog config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use amtlog_core::config::AmtlogConfig;

use crate::cli::{ConfigAction, ConfigArgs, ConfigSection};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const REDACTED: &str = "***REDACTED***";

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => {
            let report = validate(config_path).await;
            writer.render(&report)?;
            if !report.valid {
                return Err(CliError::Config("configuration is invalid".to_owned()));
            }
            Ok(())
        }
        ConfigAction::Show { section } => {
            let report = show(config_path, section).await?;
            writer.render(&report)
        }
    }
}

/// Load the file with env overrides applied and collect validation errors.
pub async fn validate(config_path: &Path) -> ConfigValidationReport {
    info!(path = %config_path.display(), "validating configuration");

    let errors = match AmtlogConfig::load(config_path).await {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };
    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Build the effective configuration report, optionally for a single section.
///
/// # Errors
///
/// Returns `CliError::Core` if the file cannot be loaded or is invalid.
pub async fn show(
    config_path: &Path,
    section: Option<ConfigSection>,
) -> Result<ConfigReport, CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let mut config = AmtlogConfig::load(config_path).await?;
    redact_credentials(&mut config);

    let config_toml = match section {
        None => to_toml(&config),
        Some(ConfigSection::General) => to_toml(&config.general),
        Some(ConfigSection::Watcher) => to_toml(&config.watcher),
        Some(ConfigSection::Parser) => to_toml(&config.parser),
        Some(ConfigSection::Vector) => to_toml(&config.vector),
        Some(ConfigSection::Syslog) => to_toml(&config.syslog),
        Some(ConfigSection::Ledger) => to_toml(&config.ledger),
        Some(ConfigSection::Metrics) => to_toml(&config.metrics),
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(|s| s.name().to_owned()),
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {e})"))
}

/// Hide the Vector bearer token. An empty token stays empty so that
/// "no auth configured" remains visible.
fn redact_credentials(config: &mut AmtlogConfig) {
    if !config.vector.auth_token.is_empty() {
        config.vector.auth_token = REDACTED.to_owned();
    }
    config.vector.endpoint = redact_url(&config.vector.endpoint);
}

/// Replace `user:password@` in a URL with the redaction marker.
fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let (scheme, rest) = url.split_at(scheme_end + 3);
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}{REDACTED}{}", &rest[at..]),
        None => url.to_owned(),
    }
}

/// Effective configuration. `config_toml` is only used by the text renderer.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Empty when valid.
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
