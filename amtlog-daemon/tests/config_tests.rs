//! Configuration loading and validation tests.
//!
//! Tests TOML parsing, environment variable overrides, partial configs and validation
//! as the daemon sees them at startup.

use std::env;

use amtlog_core::config::{AmtlogConfig, RuleKind};
use serial_test::serial;

const FULL_CONFIG: &str = r#"
[general]
log_level = "debug"
log_format = "pretty"
environment = "staging"
host = "encoder01"
pid_file = "/run/amtlog.pid"

[watcher]
log_directory = "/srv/amatsukaze/logs"
txt_wait_timeout_secs = 60
poll_interval_ms = 500

[parser]
encoding = "utf-8"
max_log_lines = 20000
rule_dir = "/etc/amtlog/rules"

[[parser.critical_rules]]
name = "audio_drift"
type = "condition"
condition = "audiodiff.maxdiff > 100 and audiodiff.maxdiff < 200"
message = "audio drift out of range"

[[parser.critical_rules]]
name = "drop_frames"
pattern = 'drop\s+\d+ frames'
case_sensitive = false

[vector]
endpoint = "https://vector.internal:9000/amatsukaze"
auth_token = "secret"
retry_max = 3

[syslog]
host = "rsyslog.internal"
port = 6514
protocol = "tcp"

[ledger]
path = "/var/lib/amtlog/ledger.db"
retention_days = 7

[metrics]
enabled = true
port = 9200
"#;

/// Clear every override variable touched by these tests.
fn clear_env() {
    for key in [
        "AMTLOG_GENERAL_LOG_LEVEL",
        "AMTLOG_WATCHER_LOG_DIRECTORY",
        "AMTLOG_VECTOR_ENABLED",
        "AMTLOG_SYSLOG_PORT",
        "AMTLOG_LEDGER_RETENTION_DAYS",
    ] {
        // SAFETY: tests touching the environment are serialized with #[serial].
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_parse_full_config() {
    let config = AmtlogConfig::parse(FULL_CONFIG).expect("full config should parse");

    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.general.environment, "staging");
    assert_eq!(config.watcher.txt_wait_timeout_secs, 60);
    assert_eq!(config.parser.critical_rules.len(), 2);
    assert_eq!(config.parser.critical_rules[0].kind, RuleKind::Condition);
    assert_eq!(config.parser.critical_rules[1].kind, RuleKind::Pattern);
    assert!(!config.parser.critical_rules[1].case_sensitive);
    assert!(config.parser.critical_rules[1].enabled);
    assert_eq!(config.syslog.protocol, "tcp");
    assert_eq!(config.ledger.retention_days, 7);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_config_uses_defaults() {
    let config = AmtlogConfig::parse("[watcher]\nlog_directory = \"/tmp/logs\"\n")
        .expect("partial config should parse");

    assert_eq!(config.watcher.log_directory, "/tmp/logs");
    assert_eq!(config.watcher.txt_wait_timeout_secs, 30);
    assert_eq!(config.vector.endpoint, "http://vector:9000/amatsukaze");
    assert_eq!(config.syslog.port, 514);
    assert_eq!(config.ledger.path, "/data/processed_logs.db");
    assert!(!config.metrics.enabled);
}

#[test]
fn test_empty_config_is_valid() {
    let config = AmtlogConfig::parse("").expect("empty config should parse");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_values_fail_validation() {
    for (toml_str, field) in [
        ("[general]\nlog_level = \"loud\"\n", "general.log_level"),
        ("[syslog]\nprotocol = \"sctp\"\n", "syslog.protocol"),
        ("[vector]\nendpoint = \"vector:9000\"\n", "vector.endpoint"),
        ("[parser]\nencoding = \"shift_jis\"\n", "parser.encoding"),
        (
            "[watcher]\ntxt_wait_timeout_secs = 1\npoll_interval_ms = 5000\n",
            "watcher.poll_interval_ms",
        ),
        (
            "[[parser.critical_rules]]\nname = \"empty\"\ntype = \"condition\"\n",
            "parser.critical_rules[0]",
        ),
    ] {
        let config = AmtlogConfig::parse(toml_str).expect("should parse");
        let err = config.validate().expect_err("should fail validation");
        assert!(
            err.to_string().contains(field),
            "error for {field} should name the field, got: {err}"
        );
    }
}

#[test]
fn test_duplicate_rule_names_fail_validation() {
    let toml_str = r#"
[[parser.critical_rules]]
name = "same"
pattern = "a"

[[parser.critical_rules]]
name = "same"
pattern = "b"
"#;
    let config = AmtlogConfig::parse(toml_str).expect("should parse");
    let err = config.validate().expect_err("duplicate names should fail");
    assert!(err.to_string().contains("duplicate rule name 'same'"));
}

#[test]
fn test_malformed_toml_fails_to_parse() {
    assert!(AmtlogConfig::parse("[watcher\nlog_directory = ").is_err());
}

#[test]
#[serial]
fn test_env_overrides_win_over_file() {
    clear_env();
    let mut config = AmtlogConfig::parse(FULL_CONFIG).expect("should parse");

    // SAFETY: serialized with #[serial].
    unsafe {
        env::set_var("AMTLOG_GENERAL_LOG_LEVEL", "warn");
        env::set_var("AMTLOG_WATCHER_LOG_DIRECTORY", "/mnt/logs");
        env::set_var("AMTLOG_VECTOR_ENABLED", "false");
        env::set_var("AMTLOG_SYSLOG_PORT", "1514");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.general.log_level, "warn");
    assert_eq!(config.watcher.log_directory, "/mnt/logs");
    assert!(!config.vector.enabled);
    assert_eq!(config.syslog.port, 1514);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_unparseable_env_override_is_ignored() {
    clear_env();
    let mut config = AmtlogConfig::default();

    // SAFETY: serialized with #[serial].
    unsafe { env::set_var("AMTLOG_LEDGER_RETENTION_DAYS", "thirty") };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.ledger.retention_days, 30);
}

#[tokio::test]
#[serial]
async fn test_load_from_file_applies_env_and_validates() {
    clear_env();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("amtlog.toml");
    std::fs::write(&path, "[general]\nlog_level = \"info\"\n").expect("write config");

    // SAFETY: serialized with #[serial].
    unsafe { env::set_var("AMTLOG_GENERAL_LOG_LEVEL", "verbose") };
    let result = AmtlogConfig::load(&path).await;
    clear_env();

    let err = result.expect_err("invalid env override should fail validation");
    assert!(err.to_string().contains("general.log_level"));
}

#[tokio::test]
async fn test_load_missing_file_fails() {
    let result = AmtlogConfig::load("/nonexistent/amtlog.toml").await;
    assert!(result.is_err());
}
