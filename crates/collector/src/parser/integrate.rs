//! 텍스트 로그 + 메타데이터 → 통합 이벤트

use amtlog_core::types::{EventLabels, EventStatus, IntegratedEvent, Severity};
use serde_json::{Map, Value, json};

use super::metadata::MetadataRecord;
use super::text::TextLogResult;
use crate::rule::RuleEngine;

/// 이벤트 라벨의 service 값
pub const SERVICE_NAME: &str = "amatsukaze";

/// 경고 상태로 판정하는 warn 행 수 (초과)
pub const WARN_THRESHOLD: u64 = 50;

/// 명령줄 부분 문자열 → 인코더 이름 (앞쪽 우선)
const ENCODERS: [(&str, &str); 5] = [
    ("qsvencc", "QSVEnc"),
    ("nvenc", "NVEnc"),
    ("vceenc", "VCEEnc"),
    ("x264", "x264"),
    ("x265", "x265"),
];

/// 명령줄 부분 문자열 → 출력 컨테이너 (앞쪽 우선)
const FORMATS: [(&[&str], &str); 3] = [
    (&["-fmt mkv", ".mkv"], "Matroska"),
    (&["-fmt mp4", ".mp4"], "MP4"),
    (&["-fmt ts", "tsreplace"], "TS"),
];

const UNKNOWN: &str = "unknown";

/// 두 파싱 결과를 합쳐 통합 이벤트를 만듭니다.
///
/// 치명 메시지는 텍스트 로그의 것이 먼저, 매칭된 condition 규칙의 메시지가 뒤에 옵니다.
pub fn integrate(
    text: &TextLogResult,
    metadata: &MetadataRecord,
    rules: &RuleEngine,
    environment: &str,
    host: &str,
) -> IntegratedEvent {
    let fields = &metadata.fields;
    let encoder = detect_encoder(&text.command_line);
    let format = detect_format(&text.command_line);
    let compression_ratio = compression_ratio(fields.srcfilesize, fields.outfilesize);
    let duration_diff = fields.srcduration - fields.outduration;

    let mut critical_errors = text.error_summary.critical_errors.clone();
    if !rules.is_empty() {
        let data = condition_data(text, metadata, compression_ratio, duration_diff, encoder, format);
        critical_errors.extend(rules.evaluate_conditions(&data));
    }

    let (status, severity) = classify(!critical_errors.is_empty(), text.error_summary.warn_count);
    let error_message = critical_errors.into_iter().next();
    let message = summary_message(&metadata.program_name, status, error_message.as_deref());

    IntegratedEvent {
        timestamp: metadata.task_id.timestamp(),
        message,
        labels: EventLabels {
            service: SERVICE_NAME.to_owned(),
            environment: environment.to_owned(),
            host: host.to_owned(),
            status,
            severity,
            encoder: encoder.to_owned(),
        },
        task_id: metadata.task_id.clone(),
        program_name: metadata.program_name.clone(),
        src_path: fields.srcpath.clone(),
        out_path: metadata.first_out_path().map(str::to_owned),
        src_filesize: fields.srcfilesize,
        out_filesize: fields.outfilesize,
        compression_ratio,
        src_duration: fields.srcduration,
        out_duration: fields.outduration,
        duration_diff,
        encoder: encoder.to_owned(),
        format: format.to_owned(),
        error_message,
        error_counts: text.error_summary.counts(),
        phases: text.phases.clone(),
        command_line: text.command_line.clone(),
    }
}

/// 상태/심각도 결정표
pub fn classify(has_critical_error: bool, warn_count: u64) -> (EventStatus, Severity) {
    if has_critical_error {
        (EventStatus::Failed, Severity::Critical)
    } else if warn_count > WARN_THRESHOLD {
        (EventStatus::Warning, Severity::Warning)
    } else {
        (EventStatus::Success, Severity::Info)
    }
}

pub fn detect_encoder(command_line: &str) -> &'static str {
    let lower = command_line.to_lowercase();
    ENCODERS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or(UNKNOWN, |(_, name)| *name)
}

pub fn detect_format(command_line: &str) -> &'static str {
    FORMATS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| command_line.contains(n)))
        .map_or(UNKNOWN, |(_, name)| *name)
}

/// 입력 크기 / 출력 크기 (소수점 2자리). 출력 크기가 0이면 0.0
pub fn compression_ratio(src_filesize: u64, out_filesize: u64) -> f64 {
    if out_filesize == 0 {
        return 0.0;
    }
    let ratio = src_filesize as f64 / out_filesize as f64;
    (ratio * 100.0).round() / 100.0
}

pub fn summary_message(program_name: &str, status: EventStatus, error: Option<&str>) -> String {
    match (status, error) {
        (EventStatus::Success, _) => format!("エンコード完了: {program_name}"),
        (EventStatus::Failed, Some(err)) => format!("エンコード失敗: {program_name} - {err}"),
        (EventStatus::Failed, None) => format!("エンコード失敗: {program_name}"),
        (EventStatus::Warning, _) => format!("エンコード完了（警告あり）: {program_name}"),
    }
}

/// condition 규칙이 참조하는 데이터: 원본 메타데이터 객체 + 파생 필드
fn condition_data(
    text: &TextLogResult,
    metadata: &MetadataRecord,
    compression_ratio: f64,
    duration_diff: f64,
    encoder: &str,
    format: &str,
) -> Value {
    let mut data = match &metadata.raw {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let summary = &text.error_summary;
    let derived = [
        ("task_id", json!(metadata.task_id.as_str())),
        ("program_name", json!(metadata.program_name)),
        ("compression_ratio", json!(compression_ratio)),
        ("duration_diff", json!(duration_diff)),
        ("encoder", json!(encoder)),
        ("format", json!(format)),
        ("info_count", json!(summary.info_count)),
        ("warn_count", json!(summary.warn_count)),
        ("error_count", json!(summary.error_count)),
        ("debug_count", json!(summary.debug_count)),
        ("stream_error_total", json!(metadata.fields.error.total())),
    ];
    for (key, value) in derived {
        data.insert(key.to_owned(), value);
    }

    Value::Object(data)
}
