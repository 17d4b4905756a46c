//! Integration tests for `amtlog parse`.

mod common;

use amtlog_cli::commands::parse::parse_task;
use amtlog_core::config::AmtlogConfig;
use amtlog_core::types::{EventStatus, Severity};

#[tokio::test]
async fn successful_task_goes_to_vector_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = AmtlogConfig::load(common::write_config(dir.path(), "")).await.unwrap();
    let json = common::write_task(dir.path(), "AmatsukazeCLI --encoder QSVEnc -f mp4\n");

    let report = parse_task(&config, &json.with_extension("txt"), &json).await.unwrap();
    assert_eq!(report.event.labels.status, EventStatus::Success);
    assert_eq!(report.event.labels.host, "encoder01");
    assert_eq!(report.event.program_name, "ニュース");
    assert_eq!(report.sinks, vec!["vector"]);
    assert!(!report.truncated);
}

#[tokio::test]
async fn critical_task_goes_to_both_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let config = AmtlogConfig::load(common::write_config(dir.path(), "")).await.unwrap();
    let json = common::write_task(
        dir.path(),
        "AmatsukazeCLI --encoder NVEncC\nAMT [error] Exception thrown\n",
    );

    let report = parse_task(&config, &json.with_extension("txt"), &json).await.unwrap();
    assert_eq!(report.event.labels.severity, Severity::Critical);
    assert_eq!(report.sinks, vec!["vector", "syslog"]);
    assert_eq!(report.lines_read, 2);
}

#[tokio::test]
async fn missing_text_log_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = AmtlogConfig::load(common::write_config(dir.path(), "")).await.unwrap();
    let json = common::write_task(dir.path(), "cmd\n");
    std::fs::remove_file(json.with_extension("txt")).unwrap();

    let err = parse_task(&config, &json.with_extension("txt"), &json)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}
