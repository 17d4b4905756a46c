//! 통합 테스트 -- 로그 쌍 생성부터 싱크 전송, 원장 기록까지의 전체 흐름 검증

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;

use amtlog_collector::{
    CollectorConfigBuilder, CollectorPipeline, CollectorPipelineBuilder, Ledger, RuleEngine,
    evaluate_custom_rule,
};
use amtlog_core::config::{CriticalRuleConfig, RuleKind, SyslogConfig, VectorConfig};
use amtlog_core::pipeline::Pipeline;
use amtlog_core::types::SinkKind;

const TASK: &str = "2025-10-18_120000.000";

/// 요청마다 주어진 상태로 응답하고 본문을 채널로 보내는 HTTP 스텁
async fn http_stub(status_line: &'static str) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/amatsukaze", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 8192];
                let body = loop {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break None;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(body) = complete_body(&buf) {
                        break Some(body);
                    }
                };
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes()).await;
                if let Some(body) = body.and_then(|b| serde_json::from_slice(&b).ok()) {
                    let _ = tx.send(body);
                }
            });
        }
    });

    (url, rx)
}

fn complete_body(buf: &[u8]) -> Option<Vec<u8>> {
    let header_end = buf.windows(4).position(|w| w == b"\r\n\r\n")?;
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let length = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let body_start = header_end + 4;
    (buf.len() >= body_start + length).then(|| buf[body_start..body_start + length].to_vec())
}

fn metadata(maxdiff: f64) -> String {
    json!({
        "srcpath": "/rec/ニュース.ts",
        "outfiles": [{"path": "/out/ニュース.mp4", "srcbitrate": 16000, "outbitrate": 4000, "outfilesize": 3_000_000_000u64}],
        "logofiles": [],
        "srcfilesize": 12_000_000_000u64,
        "intvideofilesize": 8_000_000_000u64,
        "outfilesize": 3_000_000_000u64,
        "srcduration": 1800.0,
        "outduration": 1799.0,
        "audiodiff": {"totalsrcframes": 10, "totaloutframes": 10, "totaloutuniqueframes": 10,
                      "notincludedper": 0.0, "avgdiff": 1.0, "maxdiff": maxdiff, "maxdiffpos": 1.0},
        "error": {"unknown-pts": 1},
        "cmanalyze": true
    })
    .to_string()
}

/// 텍스트 로그를 먼저, 메타데이터를 나중에 씁니다.
async fn write_pair(dir: &Path, text: &str, metadata: &str) -> PathBuf {
    tokio::fs::write(dir.join(format!("{TASK}.txt")), text).await.unwrap();
    let json = dir.join(format!("{TASK}.json"));
    tokio::fs::write(&json, metadata).await.unwrap();
    json
}

struct Harness {
    dir: tempfile::TempDir,
    pipeline: CollectorPipeline,
}

async fn harness(vector_url: &str, syslog_port: u16, rules: Vec<CriticalRuleConfig>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    tokio::fs::create_dir(&logs).await.unwrap();

    let config = CollectorConfigBuilder::new()
        .log_directory(&logs)
        .wait_timeout(Duration::from_secs(3))
        .poll_interval(Duration::from_millis(20))
        .environment("test")
        .host("encoder01")
        .ledger_path(dir.path().join("data/ledger.db").display().to_string())
        .critical_rules(rules)
        .vector(VectorConfig {
            endpoint: vector_url.to_owned(),
            timeout_secs: 2,
            ..Default::default()
        })
        .syslog(SyslogConfig {
            host: "127.0.0.1".to_owned(),
            port: syslog_port,
            protocol: "udp".to_owned(),
            ..Default::default()
        })
        .retry_interval(Duration::from_secs(3600))
        .build()
        .unwrap();

    let mut pipeline = CollectorPipelineBuilder::new().config(config).build().await.unwrap();
    pipeline.start().await.unwrap();
    Harness { dir, pipeline }
}

impl Harness {
    fn logs(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    async fn wait_for_record(&self) -> amtlog_collector::LedgerRecord {
        for _ in 0..250 {
            if let Some(record) = self.pipeline.ledger().get(TASK).await.unwrap() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no ledger record for {TASK}");
    }
}

async fn recv_json(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no request received")
        .expect("stub closed")
}

#[tokio::test]
async fn successful_task_reaches_vector_only() {
    let (url, mut bodies) = http_stub("200 OK").await;
    let syslog = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut h = harness(&url, syslog.local_addr().unwrap().port(), vec![]).await;

    write_pair(
        &h.logs(),
        "\u{feff}AmatsukazeCLI --encoder QSVEncC -fmt mp4\nAMT [info] TS解析完了: 12.5秒\nAMT [info] Mux完了: 3.0秒\n",
        &metadata(10.0),
    )
    .await;

    let body = recv_json(&mut bodies).await;
    assert_eq!(body["task_id"], TASK);
    assert_eq!(body["labels"]["status"], "success");
    assert_eq!(body["labels"]["severity"], "info");
    assert_eq!(body["labels"]["service"], "amatsukaze");
    assert_eq!(body["labels"]["environment"], "test");
    assert_eq!(body["labels"]["host"], "encoder01");
    assert_eq!(body["labels"]["encoder"], "QSVEnc");
    assert_eq!(body["format"], "MP4");
    assert_eq!(body["program_name"], "ニュース");
    assert_eq!(body["compression_ratio"], 4.0);
    assert_eq!(body["timestamp"], "2025-10-18T12:00:00.000");
    assert_eq!(body["phases"]["ts_analysis"]["status"], "completed");

    let record = h.wait_for_record().await;
    assert!(record.is_fully_delivered());
    assert_eq!(record.retry_count, 0);

    let mut buf = [0u8; 1024];
    let udp = tokio::time::timeout(Duration::from_millis(200), syslog.recv_from(&mut buf)).await;
    assert!(udp.is_err(), "non-critical events must not reach syslog");

    h.pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn critical_task_reaches_both_sinks() {
    let (url, mut bodies) = http_stub("200 OK").await;
    let syslog = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut h = harness(&url, syslog.local_addr().unwrap().port(), vec![]).await;

    write_pair(
        &h.logs(),
        "AmatsukazeCLI --encoder NVEncC\nAMT [error] Exception thrown\n",
        &metadata(10.0),
    )
    .await;

    let body = recv_json(&mut bodies).await;
    assert_eq!(body["labels"]["severity"], "critical");
    assert_eq!(body["error_message"], "Exception thrown");

    let mut buf = [0u8; 2048];
    let (n, _) = tokio::time::timeout(Duration::from_secs(5), syslog.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let line = std::str::from_utf8(&buf[..n]).unwrap();
    assert!(line.starts_with("<11>"));
    assert!(line.ends_with(" amatsukaze: CRITICAL: [ニュース] - Exception thrown"));

    let record = h.wait_for_record().await;
    assert!(record.is_delivered(SinkKind::Syslog));
    h.pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn vector_failure_is_recorded_for_retry() {
    let (url, mut bodies) = http_stub("503 Service Unavailable").await;
    let syslog = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut h = harness(&url, syslog.local_addr().unwrap().port(), vec![]).await;

    write_pair(&h.logs(), "AmatsukazeCLI\n", &metadata(10.0)).await;
    recv_json(&mut bodies).await;

    let mut record = h.wait_for_record().await;
    for _ in 0..100 {
        if record.retry_count > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        record = h.wait_for_record().await;
    }
    assert!(!record.vector_sent);
    assert!(record.syslog_sent);
    assert_eq!(record.retry_count, 1);
    assert!(record.last_error.as_deref().unwrap_or_default().contains("503"));

    let retryable = h.pipeline.ledger().list_retryable(5).await.unwrap();
    assert_eq!(retryable.len(), 1);
    h.pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn condition_rule_marks_task_failed() {
    let (url, mut bodies) = http_stub("200 OK").await;
    let syslog = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let rule = CriticalRuleConfig {
        name: "audio_drift".to_owned(),
        kind: RuleKind::Condition,
        pattern: None,
        condition: Some("audiodiff.maxdiff > 100 and audiodiff.maxdiff < 200".to_owned()),
        case_sensitive: true,
        enabled: true,
        message: Some("audio drift out of range".to_owned()),
    };
    let mut h = harness(&url, syslog.local_addr().unwrap().port(), vec![rule]).await;
    assert_eq!(h.pipeline.rule_count(), 1);

    write_pair(&h.logs(), "AmatsukazeCLI\nAMT [info] ok\n", &metadata(150.0)).await;

    let body = recv_json(&mut bodies).await;
    assert_eq!(body["labels"]["status"], "failed");
    assert_eq!(body["error_message"], "audio drift out of range");
    h.pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    let ledger = Ledger::open(&path).await.unwrap();
    ledger.record_attempt(TASK, "/logs/a.json", true, false).await.unwrap();
    ledger.record_failure(TASK, "syslog: timeout").await.unwrap();
    ledger.close().await;

    let ledger = Ledger::open(&path).await.unwrap();
    let stats = ledger.stats(5).await.unwrap();
    assert_eq!((stats.total, stats.pending), (1, 1));
    assert!(ledger.is_delivered(TASK, SinkKind::Vector).await.unwrap());
}

#[tokio::test]
async fn rule_directory_is_merged() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(
        dir.path().join("drift.yml"),
        "rules:\n  - name: big_drift\n    type: condition\n    condition: \"audiodiff.maxdiff >= 500\"\n  - name: oom\n    type: pattern\n    pattern: \"out of memory\"\n    case_sensitive: false\n",
    )
    .await
    .unwrap();

    let config = amtlog_core::config::ParserConfig {
        rule_dir: dir.path().display().to_string(),
        ..Default::default()
    };
    let engine = RuleEngine::load(&config).await.unwrap();
    assert_eq!(engine.len(), 2);
    assert!(engine.matches_any_pattern("AMT [error] Out Of Memory"));
}

#[test]
fn custom_rule_expression_is_sandboxed() {
    let data = json!({"audiodiff": {"maxdiff": 150}});
    assert!(evaluate_custom_rule("audiodiff.maxdiff > 100 and audiodiff.maxdiff < 200", &data).unwrap());
    assert!(!evaluate_custom_rule("missing.field > 1", &data).unwrap());
    assert!(evaluate_custom_rule("__import__('os').system('true')", &data).is_err());
    assert!(evaluate_custom_rule("audiodiff.maxdiff > 'x'", &data).is_err());
}
