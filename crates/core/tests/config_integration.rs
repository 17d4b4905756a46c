//! amtlog.toml 통합 설정 테스트
//!
//! - amtlog.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만 작성) 테스트
//! - 파일 로드와 환경변수 오버라이드 테스트

use amtlog_core::config::{AmtlogConfig, RuleKind};
use amtlog_core::error::{AmtlogError, ConfigError};

const EXAMPLE: &str = include_str!("../../../amtlog.toml.example");

// amtlog.toml.example 파싱 테스트

#[test]
fn example_config_parses_and_validates() {
    let config = AmtlogConfig::parse(EXAMPLE).expect("example config should parse");
    config.validate().expect("example config should validate");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = AmtlogConfig::parse(EXAMPLE).expect("should parse");
    let default = AmtlogConfig::default();

    // 예시 파일과 코드 기본값이 어긋나면 문서가 거짓이 됨
    assert_eq!(
        toml::to_string(&example).unwrap(),
        toml::to_string(&default).unwrap()
    );
}

// 부분 설정 테스트

#[test]
fn empty_file_uses_defaults() {
    let config = AmtlogConfig::parse("").expect("empty config should parse");
    config.validate().expect("defaults should validate");
    assert_eq!(config.watcher.log_directory, "/logs");
    assert_eq!(config.ledger.path, "/data/processed_logs.db");
    assert_eq!(config.syslog.port, 514);
}

#[test]
fn partial_config_single_field() {
    let toml = r#"
[syslog]
protocol = "tcp"
"#;
    let config = AmtlogConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.syslog.protocol, "tcp");
    // 나머지 필드는 기본값 유지
    assert_eq!(config.syslog.host, "rsyslogd");
    assert!(config.vector.enabled);
}

#[test]
fn inline_rules_default_to_enabled_case_sensitive_pattern() {
    let toml = r#"
[[parser.critical_rules]]
name = "drop_frames"
pattern = 'drop\s+\d+ frames'

[[parser.critical_rules]]
name = "audio_drift"
type = "condition"
condition = "audiodiff.maxdiff > 100"
enabled = false
"#;
    let config = AmtlogConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    let rules = &config.parser.critical_rules;
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].kind, RuleKind::Pattern);
    assert!(rules[0].case_sensitive);
    assert!(rules[0].enabled);
    assert_eq!(rules[1].kind, RuleKind::Condition);
    assert!(!rules[1].enabled);
}

#[test]
fn condition_rule_without_expression_is_rejected() {
    let toml = r#"
[[parser.critical_rules]]
name = "broken"
type = "condition"
"#;
    let config = AmtlogConfig::parse(toml).expect("should parse");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("parser.critical_rules[0]"));
}

#[test]
fn unknown_rule_type_fails_to_parse() {
    let toml = r#"
[[parser.critical_rules]]
name = "x"
type = "lua"
"#;
    assert!(matches!(
        AmtlogConfig::parse(toml),
        Err(AmtlogError::Config(ConfigError::ParseFailed { .. }))
    ));
}

// 파일 로드 테스트

#[tokio::test]
async fn missing_file_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = AmtlogConfig::from_file(dir.path().join("amtlog.toml"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AmtlogError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_env_then_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("amtlog.toml");
    tokio::fs::write(&path, EXAMPLE).await.unwrap();

    // SAFETY: serial_test로 환경변수 변경을 직렬화
    unsafe { std::env::set_var("AMTLOG_SYSLOG_PROTOCOL", "tcp") };
    let config = AmtlogConfig::load(&path).await;
    unsafe { std::env::set_var("AMTLOG_SYSLOG_PROTOCOL", "sctp") };
    let invalid = AmtlogConfig::load(&path).await;
    unsafe { std::env::remove_var("AMTLOG_SYSLOG_PROTOCOL") };

    assert_eq!(config.unwrap().syslog.protocol, "tcp");
    let err = invalid.unwrap_err();
    assert!(err.to_string().contains("syslog.protocol"));
}
