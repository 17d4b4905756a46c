//! 텍스트 로그 스캐너
//!
//! 첫 행은 명령줄이고, 나머지 행은 `SOURCE [level] message` 형식의 구조화 행이거나
//! 자유 텍스트입니다. 행 단위로 한 번만 훑으면서 수준별 카운트, 치명 메시지,
//! 단계 진행을 누적합니다.

use std::collections::BTreeMap;
use std::path::Path;

use amtlog_core::types::{
    ErrorSummary, LogLevel, LogSource, Phase, PhaseInfo, PhaseStatus, initial_phases,
};
use regex::Regex;
use serde::Serialize;

use crate::error::CollectorError;
use crate::rule::RuleEngine;

const BOM: char = '\u{feff}';

const LOG_LINE_PATTERN: &str = r"^(AMT|FFMPEG)\s+\[(info|warn|error|debug)\]\s+(.+)$";

const CRITICAL_PATTERNS: [&str; 3] = [r"Exception thrown", r"エラー.*終了します", r"(?i)failed to"];

const PHASE_PATTERNS: [(Phase, &str); 4] = [
    (Phase::TsAnalysis, r"TS解析完了:\s+([\d.]+)秒"),
    (Phase::LogoAnalysis, r"logo scan #\d+: Finished"),
    (Phase::Encode, r"エンコード\s+\d+:\s+[\d.]+%"),
    (Phase::Mux, r"Mux完了:\s+([\d.]+)秒"),
];

/// 구조화된 로그 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub source: LogSource,
    pub level: LogLevel,
    pub message: String,
}

/// 텍스트 로그 파싱 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLogResult {
    /// 첫 행 (BOM 제거, 앞뒤 공백 제거)
    pub command_line: String,
    /// 구조화 행 (원래 순서)
    pub logs: Vec<LogLine>,
    pub error_summary: ErrorSummary,
    /// 네 단계 모두 포함
    pub phases: BTreeMap<Phase, PhaseInfo>,
    /// 읽은 물리 행 수 (명령줄 포함)
    pub lines_read: usize,
    /// 최대 행 수에서 잘렸는지 여부
    pub truncated: bool,
}

impl TextLogResult {
    pub fn has_critical_error(&self) -> bool {
        !self.error_summary.critical_errors.is_empty()
    }
}

/// 내장 정규식 모음
#[derive(Debug)]
pub struct TextPatterns {
    log_line: Regex,
    critical: Vec<Regex>,
    phases: Vec<(Phase, Regex)>,
}

impl TextPatterns {
    pub fn compile() -> Result<Self, CollectorError> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| CollectorError::RuleConfig {
                rule: "builtin".to_owned(),
                reason: format!("invalid builtin pattern '{pattern}': {e}"),
            })
        };

        Ok(Self {
            log_line: build(LOG_LINE_PATTERN)?,
            critical: CRITICAL_PATTERNS
                .iter()
                .map(|p| build(p))
                .collect::<Result<_, _>>()?,
            phases: PHASE_PATTERNS
                .iter()
                .map(|(phase, p)| build(p).map(|re| (*phase, re)))
                .collect::<Result<_, _>>()?,
        })
    }

    fn is_critical(&self, text: &str) -> bool {
        self.critical.iter().any(|re| re.is_match(text))
    }
}

/// 행 단위 누적 스캐너
///
/// 파일 전체를 메모리에 올리지 않고 읽는 즉시 한 행씩 넣습니다.
pub struct TextLogScanner<'a> {
    patterns: &'a TextPatterns,
    rules: &'a RuleEngine,
    max_lines: usize,
    command_line: Option<String>,
    logs: Vec<LogLine>,
    summary: ErrorSummary,
    phases: BTreeMap<Phase, PhaseInfo>,
    lines_read: usize,
    truncated: bool,
}

impl<'a> TextLogScanner<'a> {
    pub fn new(patterns: &'a TextPatterns, rules: &'a RuleEngine, max_lines: usize) -> Self {
        Self {
            patterns,
            rules,
            max_lines,
            command_line: None,
            logs: Vec::new(),
            summary: ErrorSummary::default(),
            phases: initial_phases(),
            lines_read: 0,
            truncated: false,
        }
    }

    /// 한 행을 처리합니다. 최대 행 수에 도달했으면 행을 버리고 `false`를 반환합니다.
    pub fn push_line(&mut self, raw: &str) -> bool {
        if self.lines_read >= self.max_lines {
            self.truncated = true;
            return false;
        }
        self.lines_read += 1;

        if self.command_line.is_none() {
            let first = raw.strip_prefix(BOM).unwrap_or(raw);
            self.command_line = Some(first.trim().to_owned());
            return true;
        }

        let line = raw.trim();
        if line.is_empty() {
            return true;
        }

        let critical_text = match self.patterns.log_line.captures(line) {
            Some(caps) => {
                let (Some(source), Some(level), Some(message)) = (
                    caps.get(1).and_then(|m| LogSource::from_tag(m.as_str())),
                    caps.get(2).and_then(|m| LogLevel::from_tag(m.as_str())),
                    caps.get(3).map(|m| m.as_str()),
                ) else {
                    return true;
                };
                self.summary.record(level);
                self.logs.push(LogLine {
                    source,
                    level,
                    message: message.to_owned(),
                });
                message
            }
            None => line,
        };

        if self.patterns.is_critical(critical_text) || self.rules.matches_any_pattern(critical_text)
        {
            self.summary.critical_errors.push(critical_text.to_owned());
        }

        self.update_phases(line);
        true
    }

    fn update_phases(&mut self, line: &str) {
        for (phase, re) in &self.patterns.phases {
            let Some(info) = self.phases.get_mut(phase) else {
                continue;
            };
            if info.status == PhaseStatus::Completed {
                continue;
            }
            if let Some(caps) = re.captures(line) {
                info.status = PhaseStatus::Completed;
                info.duration = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            }
        }
    }

    /// 누적 결과를 반환합니다.
    ///
    /// # Errors
    /// 읽은 행이 없거나 BOM만 있는 한 행이면 [`CollectorError::EmptyInput`]
    pub fn finish(self, path: &Path) -> Result<TextLogResult, CollectorError> {
        let empty = self.command_line.is_none()
            || (self.lines_read == 1 && self.command_line.as_deref() == Some(""));
        if empty {
            return Err(CollectorError::EmptyInput {
                path: path.display().to_string(),
            });
        }

        Ok(TextLogResult {
            command_line: self.command_line.unwrap_or_default(),
            logs: self.logs,
            error_summary: self.summary,
            phases: self.phases,
            lines_read: self.lines_read,
            truncated: self.truncated,
        })
    }
}
