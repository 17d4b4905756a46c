//! 컴파일된 치명 규칙
//!
//! 정규식과 조건식은 규칙 로딩 시 한 번만 컴파일합니다.
//! 평가에 실패한 규칙은 프로세스가 끝날 때까지 비활성화됩니다.

use std::sync::atomic::{AtomicBool, Ordering};

use amtlog_core::config::{CriticalRuleConfig, RuleKind};
use amtlog_core::metrics as m;
use regex::{Regex, RegexBuilder};

use super::condition::Condition;
use crate::error::CollectorError;

/// 규칙 종류별 매처
#[derive(Debug)]
pub enum RuleMatcher {
    /// 메시지에 대한 정규식
    Pattern(Regex),
    /// 메타데이터에 대한 조건식
    Condition(Condition),
}

/// 컴파일된 치명 규칙 하나
#[derive(Debug)]
pub struct CompiledRule {
    name: String,
    matcher: RuleMatcher,
    message: Option<String>,
    disabled: AtomicBool,
}

impl CompiledRule {
    /// 규칙 설정을 컴파일합니다.
    ///
    /// # Errors
    /// 정규식 또는 조건식이 잘못되었으면 [`CollectorError::RuleConfig`]
    pub fn compile(config: &CriticalRuleConfig) -> Result<Self, CollectorError> {
        config
            .validate()
            .map_err(|reason| rule_error(&config.name, reason))?;

        let matcher = match config.kind {
            RuleKind::Pattern => {
                let pattern = config.pattern.as_deref().unwrap_or_default();
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(!config.case_sensitive)
                    .size_limit(1 << 20)
                    .build()
                    .map_err(|e| rule_error(&config.name, format!("invalid pattern: {e}")))?;
                RuleMatcher::Pattern(regex)
            }
            RuleKind::Condition => {
                let source = config.condition.as_deref().unwrap_or_default();
                let condition = Condition::compile(source)
                    .map_err(|e| rule_error(&config.name, format!("invalid condition: {e}")))?;
                RuleMatcher::Condition(condition)
            }
        };

        Ok(Self {
            name: config.name.clone(),
            matcher,
            message: config.message.clone(),
            disabled: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RuleKind {
        match self.matcher {
            RuleMatcher::Pattern(_) => RuleKind::Pattern,
            RuleMatcher::Condition(_) => RuleKind::Condition,
        }
    }

    /// 평가 실패로 비활성화되었는지 여부
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// 치명 메시지 목록에 추가할 문구
    pub fn critical_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("critical rule '{}' matched", self.name))
    }

    /// pattern 규칙이 텍스트에 매칭되는지 확인합니다. condition 규칙은 항상 false입니다.
    pub fn matches_text(&self, text: &str) -> bool {
        match &self.matcher {
            RuleMatcher::Pattern(regex) => !self.is_disabled() && regex.is_match(text),
            RuleMatcher::Condition(_) => false,
        }
    }

    /// condition 규칙을 데이터에 대해 평가합니다. pattern 규칙은 항상 false입니다.
    ///
    /// 평가 실패 시 규칙을 비활성화하고 false를 반환합니다.
    pub fn matches_data(&self, data: &serde_json::Value) -> bool {
        let RuleMatcher::Condition(condition) = &self.matcher else {
            return false;
        };
        if self.is_disabled() {
            return false;
        }

        match condition.evaluate(data) {
            Ok(matched) => matched,
            Err(reason) => {
                self.disable(&reason);
                false
            }
        }
    }

    fn disable(&self, reason: &str) {
        if !self.disabled.swap(true, Ordering::Relaxed) {
            tracing::error!(
                rule = %self.name,
                reason,
                "critical rule evaluation failed, disabling rule"
            );
            metrics::counter!(m::PARSER_RULES_DISABLED_TOTAL).increment(1);
        }
    }
}

fn rule_error(rule: &str, reason: impl Into<String>) -> CollectorError {
    CollectorError::RuleConfig {
        rule: rule.to_owned(),
        reason: reason.into(),
    }
}
