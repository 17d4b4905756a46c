//! 규칙 파일 로더 -- YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::collections::HashSet;
use std::path::Path;

use amtlog_core::config::CriticalRuleConfig;

use super::types::RuleFile;
use crate::error::CollectorError;

/// 규칙 파일 하나의 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 1024 * 1024; // 1MB
const MAX_RULES_COUNT: usize = 1_000;

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 디렉토리에서 모든 YAML 규칙 파일을 로드합니다.
    ///
    /// 파일은 이름 순으로 처리되며, 이미 나온 이름의 규칙은 경고 후 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<CriticalRuleConfig>, CollectorError> {
        let dir = dir.as_ref();
        let dir_error = |reason: String| CollectorError::RuleLoad {
            path: dir.display().to_string(),
            reason,
        };

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| dir_error(format!("failed to read directory: {e}")))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| dir_error(format!("failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut rules = Vec::new();
        let mut seen_names = HashSet::new();

        for path in paths {
            let loaded = match Self::load_file(&path).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                    continue;
                }
            };

            for rule in loaded {
                if !seen_names.insert(rule.name.clone()) {
                    tracing::warn!(
                        rule = %rule.name,
                        path = %path.display(),
                        "duplicate rule name, skipping"
                    );
                    continue;
                }
                rules.push(rule);
            }

            if rules.len() > MAX_RULES_COUNT {
                return Err(dir_error(format!("too many rules: max {MAX_RULES_COUNT}")));
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = rules.len(),
            "loaded critical rules"
        );

        Ok(rules)
    }

    /// 단일 YAML 파일에서 규칙 목록을 로드합니다.
    pub async fn load_file(
        path: impl AsRef<Path>,
    ) -> Result<Vec<CriticalRuleConfig>, CollectorError> {
        let path = path.as_ref();
        let file_error = |reason: String| CollectorError::RuleLoad {
            path: path.display().to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| file_error(format!("failed to read file metadata: {e}")))?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(file_error(format!(
                "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| file_error(format!("failed to read file: {e}")))?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 규칙 목록을 만듭니다.
    pub fn parse_yaml(
        yaml_str: &str,
        source: &str,
    ) -> Result<Vec<CriticalRuleConfig>, CollectorError> {
        let file: RuleFile = serde_yaml::from_str(yaml_str).map_err(|e| CollectorError::RuleLoad {
            path: source.to_owned(),
            reason: format!("YAML parse error: {e}"),
        })?;

        file.validate(source)?;

        Ok(file.rules)
    }
}
