//! `amtlog rules` command handler

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use amtlog_collector::RuleLoader;
use amtlog_collector::rule::CompiledRule;
use amtlog_core::config::{AmtlogConfig, CriticalRuleConfig, RuleKind};

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List => {
            let report = list(config_path).await?;
            writer.render(&report)
        }
        RulesAction::Validate { path } => {
            let path = match path {
                Some(path) => path,
                None => {
                    let config = AmtlogConfig::load(config_path).await?;
                    if config.parser.rule_dir.is_empty() {
                        return Err(CliError::Command(
                            "no path given and parser.rule_dir is not set".to_owned(),
                        ));
                    }
                    PathBuf::from(config.parser.rule_dir)
                }
            };
            let report = validate(&path).await?;
            writer.render(&report)?;
            if report.invalid > 0 {
                return Err(CliError::Rule(format!(
                    "{} of {} rule file(s) invalid",
                    report.invalid, report.total_files
                )));
            }
            Ok(())
        }
    }
}

/// List inline rules followed by rules from `parser.rule_dir`.
pub async fn list(config_path: &Path) -> Result<RuleListReport, CliError> {
    let config = AmtlogConfig::load(config_path).await?;

    let mut rules: Vec<RuleEntry> = config
        .parser
        .critical_rules
        .iter()
        .map(|r| RuleEntry::new(r, "inline"))
        .collect();

    if !config.parser.rule_dir.is_empty() {
        info!(rule_dir = %config.parser.rule_dir, "loading rule directory");
        let loaded = RuleLoader::load_directory(&config.parser.rule_dir).await?;
        let inline: HashSet<String> = rules.iter().map(|r| r.name.clone()).collect();
        rules.extend(
            loaded
                .iter()
                .filter(|r| !inline.contains(&r.name))
                .map(|r| RuleEntry::new(r, &config.parser.rule_dir)),
        );
    }

    Ok(RuleListReport {
        total: rules.len(),
        rules,
    })
}

/// Validate a rule file or every `.yml`/`.yaml` file in a directory.
///
/// Unlike the daemon, which skips broken files, every failure is reported:
/// YAML errors, invalid patterns or conditions and names repeated across files.
pub async fn validate(path: &Path) -> Result<RuleValidationReport, CliError> {
    info!(path = %path.display(), "validating rule files");

    let files = rule_files(path).await?;
    let mut seen = HashSet::new();
    let mut errors = Vec::new();
    let mut rules = 0;

    for file in &files {
        let source = file.display().to_string();
        let loaded = match RuleLoader::load_file(file).await {
            Ok(loaded) => loaded,
            Err(e) => {
                errors.push(RuleError::new(&source, e.to_string()));
                continue;
            }
        };

        let before = errors.len();
        for rule in &loaded {
            if !seen.insert(rule.name.clone()) {
                errors.push(RuleError::new(
                    &source,
                    format!("rule '{}' is already defined in another file", rule.name),
                ));
            } else if let Err(e) = CompiledRule::compile(rule) {
                errors.push(RuleError::new(&source, e.to_string()));
            }
        }
        if errors.len() == before {
            rules += loaded.len();
        }
    }

    let invalid = errors
        .iter()
        .map(|e| e.file.as_str())
        .collect::<HashSet<_>>()
        .len();
    Ok(RuleValidationReport {
        path: path.display().to_string(),
        total_files: files.len(),
        valid: files.len() - invalid,
        invalid,
        rules,
        errors,
    })
}

async fn rule_files(path: &Path) -> Result<Vec<PathBuf>, CliError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| CliError::Command(format!("cannot read {}: {e}", path.display())))?;
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut entries = tokio::fs::read_dir(path).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let p = entry.path();
        if p.extension().is_some_and(|ext| ext == "yml" || ext == "yaml") {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub total: usize,
    pub rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
pub struct RuleEntry {
    pub name: String,
    pub kind: RuleKind,
    pub enabled: bool,
    /// Pattern or condition source.
    pub expression: String,
    /// `inline` or the rule directory.
    pub source: String,
}

impl RuleEntry {
    fn new(rule: &CriticalRuleConfig, source: &str) -> Self {
        let expression = match rule.kind {
            RuleKind::Pattern => rule.pattern.clone(),
            RuleKind::Condition => rule.condition.clone(),
        };
        Self {
            name: rule.name.clone(),
            kind: rule.kind,
            enabled: rule.enabled,
            expression: expression.unwrap_or_default(),
            source: source.to_owned(),
        }
    }
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Critical Rules ({} total)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<24} {:<10} {:<9} {:<40} Source",
            "Name", "Kind", "Status", "Expression"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;

        for r in &self.rules {
            let kind = match r.kind {
                RuleKind::Pattern => "pattern",
                RuleKind::Condition => "condition",
            };
            let status = if r.enabled {
                "enabled".green()
            } else {
                "disabled".yellow()
            };
            writeln!(
                w,
                "{:<24} {:<10} {:<9} {:<40} {}",
                r.name, kind, status, r.expression, r.source
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Rules in valid files.
    pub rules: usize,
    pub errors: Vec<RuleError>,
}

#[derive(Serialize)]
pub struct RuleError {
    pub file: String,
    pub error: String,
}

impl RuleError {
    fn new(file: &str, error: String) -> Self {
        Self {
            file: file.to_owned(),
            error,
        }
    }
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Files: {} total, {} valid, {} invalid ({} rules)",
            self.total_files,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            },
            self.rules
        )?;

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                writeln!(w, "  {}: {}", e.file.red(), e.error)?;
            }
        }
        Ok(())
    }
}
