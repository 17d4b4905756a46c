//! 치명 규칙 엔진 -- 운영자 정의 pattern/condition 규칙
//!
//! 인라인 규칙(`[[parser.critical_rules]]`)과 규칙 디렉토리의 YAML 파일을
//! 합쳐 컴파일하고, 파서가 텍스트 행과 메타데이터에 대해 평가합니다.
//!
//! # 규칙 형식
//! ```yaml
//! rules:
//!   - name: audio_drift
//!     type: condition
//!     condition: "audiodiff.maxdiff > 100 and audiodiff.maxdiff < 200"
//!     message: "audio drift out of range"
//!   - name: drop_frames
//!     type: pattern
//!     pattern: 'drop\s+\d+ frames'
//!     case_sensitive: false
//! ```
//!
//! # 아키텍처
//! - [`RuleEngine`]: 컴파일된 규칙 집합과 평가 진입점
//! - [`loader`]: YAML 파일 로딩 및 형태 검증
//! - [`matcher`]: 규칙 하나의 컴파일과 매칭
//! - [`condition`]: 조건식 언어
//! - [`types`]: 규칙 파일 데이터 구조

pub mod condition;
pub mod loader;
pub mod matcher;
pub mod types;

pub use condition::{Condition, evaluate_custom_rule};
pub use loader::RuleLoader;
pub use matcher::{CompiledRule, RuleMatcher};
pub use types::RuleFile;

use std::collections::HashSet;

use amtlog_core::config::{CriticalRuleConfig, ParserConfig, RuleKind};

use crate::error::CollectorError;

/// 치명 규칙 엔진
///
/// 평가 메서드는 `&self`만 받으므로 `Arc`로 여러 태스크가 공유할 수 있습니다.
///
/// # 사용 예시
/// ```ignore
/// let engine = RuleEngine::load(&config.parser).await?;
///
/// if engine.matches_any_pattern("drop 12 frames") {
///     // 치명 메시지로 기록
/// }
/// let messages = engine.evaluate_conditions(&metadata_json);
/// ```
#[derive(Debug, Default)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// 규칙이 없는 엔진을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙 설정 목록을 컴파일합니다. `enabled = false`인 규칙은 제외됩니다.
    ///
    /// # Errors
    /// 이름 중복, 잘못된 정규식 또는 조건식은 [`CollectorError::RuleConfig`]
    pub fn compile(configs: &[CriticalRuleConfig]) -> Result<Self, CollectorError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(configs.len());

        for config in configs {
            if !seen.insert(config.name.as_str()) {
                return Err(CollectorError::RuleConfig {
                    rule: config.name.clone(),
                    reason: "duplicate rule name".to_owned(),
                });
            }
            if !config.enabled {
                tracing::debug!(rule = %config.name, "critical rule disabled by config");
                continue;
            }
            rules.push(CompiledRule::compile(config)?);
        }

        Ok(Self { rules })
    }

    /// 파서 설정의 인라인 규칙과 `rule_dir`의 규칙을 합쳐 컴파일합니다.
    ///
    /// 디렉토리 규칙 중 인라인 규칙과 이름이 겹치는 것은 경고 후 건너뜁니다.
    pub async fn load(config: &ParserConfig) -> Result<Self, CollectorError> {
        let mut configs = config.critical_rules.clone();

        if !config.rule_dir.is_empty() {
            let inline: HashSet<String> = configs.iter().map(|r| r.name.clone()).collect();
            for rule in RuleLoader::load_directory(&config.rule_dir).await? {
                if inline.contains(&rule.name) {
                    tracing::warn!(
                        rule = %rule.name,
                        dir = %config.rule_dir,
                        "rule file redefines an inline rule, skipping"
                    );
                    continue;
                }
                configs.push(rule);
            }
        }

        let engine = Self::compile(&configs)?;
        tracing::info!(
            patterns = engine.count(RuleKind::Pattern),
            conditions = engine.count(RuleKind::Condition),
            "critical rules compiled"
        );
        Ok(engine)
    }

    /// 활성 pattern 규칙 중 하나라도 텍스트에 매칭되는지 확인합니다.
    pub fn matches_any_pattern(&self, text: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches_text(text))
    }

    /// condition 규칙을 평가하여 매칭된 규칙의 치명 메시지를 규칙 순서대로 반환합니다.
    ///
    /// 평가 실패한 규칙은 비활성화되고 매칭되지 않은 것으로 취급됩니다.
    pub fn evaluate_conditions(&self, data: &serde_json::Value) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| rule.matches_data(data))
            .map(CompiledRule::critical_message)
            .collect()
    }

    /// 컴파일된 규칙 목록
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// 종류별 규칙 수
    pub fn count(&self, kind: RuleKind) -> usize {
        self.rules.iter().filter(|r| r.kind() == kind).count()
    }

    /// 평가 실패로 비활성화되지 않은 규칙 수
    pub fn active_count(&self) -> usize {
        self.rules.iter().filter(|r| !r.is_disabled()).count()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
