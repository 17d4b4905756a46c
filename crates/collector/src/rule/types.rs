//! 규칙 파일 데이터 타입
//!
//! 규칙 YAML 파일에서 역직렬화되는 구조체를 정의합니다.
//! 개별 규칙의 형태는 인라인 규칙과 같은 [`CriticalRuleConfig`]입니다.

use amtlog_core::config::CriticalRuleConfig;
use serde::{Deserialize, Serialize};

use crate::error::CollectorError;

/// 규칙 이름 최대 길이
const MAX_RULE_NAME_LEN: usize = 256;

/// 규칙 파일 하나
///
/// # YAML 스키마
/// ```yaml
/// rules:
///   - name: audio_drift
///     type: condition
///     condition: "audiodiff.maxdiff > 100 and audiodiff.maxdiff < 200"
///     message: "audio drift out of range"
///   - name: drop_frames
///     type: pattern
///     pattern: 'drop\s+\d+ frames'
///     case_sensitive: false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    /// 규칙 목록
    #[serde(default)]
    pub rules: Vec<CriticalRuleConfig>,
}

impl RuleFile {
    /// 파일 안의 규칙 형태를 검증합니다.
    pub fn validate(&self, source: &str) -> Result<(), CollectorError> {
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.name.len() > MAX_RULE_NAME_LEN {
                return Err(CollectorError::RuleLoad {
                    path: source.to_owned(),
                    reason: format!(
                        "rules[{idx}]: name must not exceed {MAX_RULE_NAME_LEN} characters"
                    ),
                });
            }
            rule.validate().map_err(|reason| CollectorError::RuleLoad {
                path: source.to_owned(),
                reason: format!("rules[{idx}]: {reason}"),
            })?;
        }
        Ok(())
    }
}
