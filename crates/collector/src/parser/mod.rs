//! 로그 파싱 모듈 -- 텍스트 로그, 메타데이터, 통합 이벤트
//!
//! [`LogParser`]는 태스크 하나의 두 산출물을 읽어 [`IntegratedEvent`]로 합칩니다.
//!
//! # 구성
//! - [`text`]: 텍스트 로그 스캐너 (수준 카운트, 치명 메시지, 단계 진행)
//! - [`metadata`]: 메타데이터 JSON 디코더
//! - [`integrate`]: 상태/심각도 결정표, 인코더/포맷 판별, 요약 메시지
//!
//! # 사용 예시
//! ```ignore
//! use amtlog_collector::parser::LogParser;
//!
//! let parser = LogParser::new(&config.parser, rules)?;
//! let text = parser.parse_text(&pair.text_path).await?;
//! let metadata = parser.parse_metadata(&pair.metadata_path).await?;
//! let event = parser.integrate(&text, &metadata, "production", "encoder-01");
//! ```

pub mod integrate;
pub mod metadata;
pub mod text;

pub use integrate::{classify, compression_ratio, detect_encoder, detect_format};
pub use metadata::{AudioDiff, ErrorHistogram, MetadataFields, MetadataRecord, OutFile};
pub use text::{LogLine, TextLogResult, TextLogScanner, TextPatterns};

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use amtlog_core::config::ParserConfig;
use amtlog_core::types::IntegratedEvent;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::CollectorError;
use crate::rule::RuleEngine;

/// 메타데이터 파일 최대 크기
const MAX_METADATA_SIZE: u64 = 16 * 1024 * 1024; // 16MB

/// 태스크 파서
///
/// 내장 정규식과 공유 규칙 엔진을 소유합니다. 모든 메서드가 `&self`라
/// 여러 태스크가 동시에 사용할 수 있습니다.
pub struct LogParser {
    patterns: TextPatterns,
    rules: Arc<RuleEngine>,
    max_log_lines: usize,
}

impl LogParser {
    /// 파서 설정과 컴파일된 규칙으로 파서를 생성합니다.
    pub fn new(config: &ParserConfig, rules: Arc<RuleEngine>) -> Result<Self, CollectorError> {
        Ok(Self {
            patterns: TextPatterns::compile()?,
            rules,
            max_log_lines: config.max_log_lines,
        })
    }

    /// 기본 설정, 사용자 규칙 없이 파서를 생성합니다.
    pub fn with_defaults() -> Result<Self, CollectorError> {
        Self::new(&ParserConfig::default(), Arc::new(RuleEngine::new()))
    }

    /// 공유 규칙 엔진
    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    /// 텍스트 로그 파일을 스트리밍으로 파싱합니다.
    ///
    /// 최대 행 수를 넘는 행은 읽지 않습니다.
    ///
    /// # Errors
    /// - 파일 없음: [`CollectorError::NotFound`]
    /// - 행 없음: [`CollectorError::EmptyInput`]
    /// - UTF-8이 아님: [`CollectorError::MalformedInput`]
    pub async fn parse_text(&self, path: &Path) -> Result<TextLogResult, CollectorError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| io_error(path, e))?;
        let mut lines = BufReader::new(file).lines();
        let mut scanner = TextLogScanner::new(&self.patterns, &self.rules, self.max_log_lines);

        while let Some(line) = lines.next_line().await.map_err(|e| io_error(path, e))? {
            if !scanner.push_line(&line) {
                break;
            }
        }

        let result = scanner.finish(path)?;
        tracing::debug!(
            path = %path.display(),
            lines = result.lines_read,
            truncated = result.truncated,
            critical = result.error_summary.critical_errors.len(),
            "text log parsed"
        );
        Ok(result)
    }

    /// 메모리의 텍스트 로그를 파싱합니다. `source`는 에러 메시지에 쓰입니다.
    pub fn parse_text_str(
        &self,
        content: &str,
        source: &Path,
    ) -> Result<TextLogResult, CollectorError> {
        let mut scanner = TextLogScanner::new(&self.patterns, &self.rules, self.max_log_lines);
        for line in content.lines() {
            if !scanner.push_line(line) {
                break;
            }
        }
        scanner.finish(source)
    }

    /// 메타데이터 파일을 파싱합니다.
    ///
    /// # Errors
    /// - 파일 없음: [`CollectorError::NotFound`]
    /// - 디코딩 실패, 필수 필드 누락, 잘못된 태스크 ID: [`CollectorError::MalformedInput`]
    pub async fn parse_metadata(&self, path: &Path) -> Result<MetadataRecord, CollectorError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error(path, e))?
            .len();
        if size > MAX_METADATA_SIZE {
            return Err(CollectorError::MalformedInput {
                path: path.display().to_string(),
                reason: format!("file too large: {size} bytes (max: {MAX_METADATA_SIZE})"),
            });
        }

        let content = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
        MetadataRecord::from_slice(path, &content)
    }

    /// 두 파싱 결과를 통합 이벤트로 합칩니다.
    pub fn integrate(
        &self,
        text: &TextLogResult,
        metadata: &MetadataRecord,
        environment: &str,
        host: &str,
    ) -> IntegratedEvent {
        integrate::integrate(text, metadata, &self.rules, environment, host)
    }
}

fn io_error(path: &Path, err: std::io::Error) -> CollectorError {
    match err.kind() {
        ErrorKind::NotFound => CollectorError::NotFound {
            path: path.display().to_string(),
        },
        ErrorKind::InvalidData => CollectorError::MalformedInput {
            path: path.display().to_string(),
            reason: format!("not valid UTF-8: {err}"),
        },
        _ => CollectorError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amtlog_core::config::{CriticalRuleConfig, RuleKind};
    use amtlog_core::types::{EventStatus, Severity};
    use serde_json::json;

    const TASK: &str = "2025-10-18_120000.000";

    fn metadata_json(outfilesize: u64) -> String {
        json!({
            "srcpath": "/rec/ドラマ.ts",
            "outfiles": [{"path": "/out/ドラマ.mp4", "srcbitrate": 1, "outbitrate": 1, "outfilesize": outfilesize}],
            "srcfilesize": 12_000_000_000u64,
            "intvideofilesize": 1,
            "outfilesize": outfilesize,
            "srcduration": 1800.0,
            "outduration": 1795.5,
            "audiodiff": {"totalsrcframes": 1, "totaloutframes": 1, "totaloutuniqueframes": 1,
                          "notincludedper": 0.0, "avgdiff": 1.0, "maxdiff": 150.0, "maxdiffpos": 0.0},
            "error": {},
            "cmanalyze": true
        })
        .to_string()
    }

    async fn write_pair(dir: &Path, text: &str, outfilesize: u64) -> (std::path::PathBuf, std::path::PathBuf) {
        let txt = dir.join(format!("{TASK}.txt"));
        let json = dir.join(format!("{TASK}.json"));
        tokio::fs::write(&txt, text).await.unwrap();
        tokio::fs::write(&json, metadata_json(outfilesize)).await.unwrap();
        (txt, json)
    }

    #[tokio::test]
    async fn parses_and_integrates_successful_task() {
        let dir = tempfile::tempdir().unwrap();
        let (txt, json) = write_pair(
            dir.path(),
            "\u{feff}amt --encoder x265 -fmt mkv\nAMT [info] TS解析完了: 10.0秒\n",
            3_000_000_000,
        )
        .await;

        let parser = LogParser::with_defaults().unwrap();
        let text = parser.parse_text(&txt).await.unwrap();
        let metadata = parser.parse_metadata(&json).await.unwrap();
        let event = parser.integrate(&text, &metadata, "production", "encoder-01");

        assert_eq!(event.labels.status, EventStatus::Success);
        assert_eq!(event.labels.severity, Severity::Info);
        assert_eq!(event.labels.service, "amatsukaze");
        assert_eq!(event.labels.host, "encoder-01");
        assert_eq!(event.labels.encoder, "x265");
        assert_eq!(event.format, "Matroska");
        assert_eq!(event.message, "エンコード完了: ドラマ");
        assert_eq!(event.compression_ratio, 4.0);
        assert_eq!(event.duration_diff, 4.5);
        assert_eq!(event.out_path.as_deref(), Some("/out/ドラマ.mp4"));
        assert_eq!(event.timestamp, metadata.task_id.timestamp());
        assert!(event.error_message.is_none());
    }

    #[tokio::test]
    async fn critical_text_makes_task_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (txt, json) = write_pair(
            dir.path(),
            "amt\nAMT [error] Exception thrown\nAMT [error] failed to open file\n",
            0,
        )
        .await;

        let parser = LogParser::with_defaults().unwrap();
        let text = parser.parse_text(&txt).await.unwrap();
        let metadata = parser.parse_metadata(&json).await.unwrap();
        let event = parser.integrate(&text, &metadata, "production", "h");

        assert_eq!(event.labels.status, EventStatus::Failed);
        assert_eq!(event.labels.severity, Severity::Critical);
        assert_eq!(event.error_message.as_deref(), Some("Exception thrown"));
        assert_eq!(event.message, "エンコード失敗: ドラマ - Exception thrown");
        assert_eq!(event.compression_ratio, 0.0);
    }

    #[tokio::test]
    async fn warn_threshold_boundary() {
        let parser = LogParser::with_defaults().unwrap();
        let metadata = MetadataRecord::from_slice(
            Path::new(&format!("{TASK}.json")),
            metadata_json(1).as_bytes(),
        )
        .unwrap();

        let text_of = |warns: usize| {
            let mut content = String::from("amt\n");
            content.push_str(&"AMT [warn] dropped packet\n".repeat(warns));
            parser.parse_text_str(&content, Path::new("t.txt")).unwrap()
        };

        let fifty_one = parser.integrate(&text_of(51), &metadata, "p", "h");
        assert_eq!(fifty_one.labels.status, EventStatus::Warning);
        assert_eq!(fifty_one.labels.severity, Severity::Warning);
        assert_eq!(fifty_one.message, "エンコード完了（警告あり）: ドラマ");

        let fifty = parser.integrate(&text_of(50), &metadata, "p", "h");
        assert_eq!(fifty.labels.status, EventStatus::Success);
    }

    #[tokio::test]
    async fn condition_rule_forces_failure() {
        let rules = RuleEngine::compile(&[CriticalRuleConfig {
            name: "audio_drift".to_owned(),
            kind: RuleKind::Condition,
            pattern: None,
            condition: Some("audiodiff.maxdiff > 100 and encoder == 'unknown'".to_owned()),
            case_sensitive: true,
            enabled: true,
            message: Some("audio drift out of range".to_owned()),
        }])
        .unwrap();
        let parser = LogParser::new(&ParserConfig::default(), Arc::new(rules)).unwrap();
        let metadata = MetadataRecord::from_slice(
            Path::new(&format!("{TASK}.json")),
            metadata_json(1).as_bytes(),
        )
        .unwrap();
        let text = parser.parse_text_str("amt", Path::new("t.txt")).unwrap();

        let event = parser.integrate(&text, &metadata, "p", "h");
        assert_eq!(event.labels.severity, Severity::Critical);
        assert_eq!(event.error_message.as_deref(), Some("audio drift out of range"));
    }

    #[tokio::test]
    async fn condition_rule_sees_stream_error_total() {
        let rules = RuleEngine::compile(&[CriticalRuleConfig {
            name: "stream_errors".to_owned(),
            kind: RuleKind::Condition,
            pattern: None,
            condition: Some("stream_error_total >= 3".to_owned()),
            case_sensitive: true,
            enabled: true,
            message: Some("too many stream errors".to_owned()),
        }])
        .unwrap();
        let parser = LogParser::new(&ParserConfig::default(), Arc::new(rules)).unwrap();
        let text = parser.parse_text_str("amt", Path::new("t.txt")).unwrap();

        let mut value: serde_json::Value = serde_json::from_str(&metadata_json(1)).unwrap();
        value["error"] = json!({"unknown-pts": 2, "no-drcs-map": 1});
        let noisy = MetadataRecord::from_slice(
            Path::new(&format!("{TASK}.json")),
            value.to_string().as_bytes(),
        )
        .unwrap();
        let event = parser.integrate(&text, &noisy, "p", "h");
        assert_eq!(event.labels.status, EventStatus::Failed);
        assert_eq!(event.error_message.as_deref(), Some("too many stream errors"));

        value["error"] = json!({"unknown-pts": 2});
        let quiet = MetadataRecord::from_slice(
            Path::new(&format!("{TASK}.json")),
            value.to_string().as_bytes(),
        )
        .unwrap();
        let event = parser.integrate(&text, &quiet, "p", "h");
        assert_eq!(event.labels.status, EventStatus::Success);
    }

    #[tokio::test]
    async fn missing_files_are_not_found() {
        let parser = LogParser::with_defaults().unwrap();
        let missing = Path::new("/nonexistent/2025-10-18_120000.000.txt");
        assert!(matches!(
            parser.parse_text(missing).await,
            Err(CollectorError::NotFound { .. })
        ));
        assert!(matches!(
            parser.parse_metadata(&missing.with_extension("json")).await,
            Err(CollectorError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{TASK}.txt"));
        tokio::fs::write(&path, b"amt\n\xff\xfe broken\n").await.unwrap();

        let parser = LogParser::with_defaults().unwrap();
        assert!(matches!(
            parser.parse_text(&path).await,
            Err(CollectorError::MalformedInput { .. })
        ));
    }

    #[tokio::test]
    async fn empty_text_file_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{TASK}.txt"));
        tokio::fs::write(&path, "").await.unwrap();

        let parser = LogParser::with_defaults().unwrap();
        assert!(matches!(
            parser.parse_text(&path).await,
            Err(CollectorError::EmptyInput { .. })
        ));
    }
}
