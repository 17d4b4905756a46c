//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 태스크 식별자, 로그 수준, 처리 단계, 통합 이벤트 등
//! 모든 모듈이 공유하는 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InputError;

/// 태스크 ID 형식 (`YYYY-MM-DD_HHMMSS.mmm`)
const TASK_ID_FORMAT: &str = "%Y-%m-%d_%H%M%S%.3f";

/// 태스크 ID 길이
const TASK_ID_LEN: usize = 21;

/// 이벤트 타임스탬프 직렬화 형식 (ISO-8601, 로컬 시각)
const EVENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// 트랜스코딩 작업 하나를 식별하는 ID
///
/// 두 산출물(`<stem>.json`, `<stem>.txt`)이 공유하는 파일명 stem에서 파생되며,
/// 작업 시작 시각을 밀리초 단위로 내장합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    raw: String,
    timestamp: NaiveDateTime,
}

impl TaskId {
    /// 문자열을 태스크 ID로 파싱합니다.
    ///
    /// 형식이 맞지 않거나 존재하지 않는 날짜/시각이면 실패합니다.
    pub fn parse(value: &str) -> Result<Self, InputError> {
        let malformed = |reason: &str| InputError::Malformed {
            path: value.to_owned(),
            reason: format!("invalid task id: {reason}"),
        };

        if value.len() != TASK_ID_LEN {
            return Err(malformed("expected YYYY-MM-DD_HHMMSS.mmm"));
        }

        let shape_ok = value.bytes().enumerate().all(|(idx, b)| match idx {
            4 | 7 => b == b'-',
            10 => b == b'_',
            17 => b == b'.',
            _ => b.is_ascii_digit(),
        });
        if !shape_ok {
            return Err(malformed("expected YYYY-MM-DD_HHMMSS.mmm"));
        }

        let timestamp = NaiveDateTime::parse_from_str(value, TASK_ID_FORMAT)
            .map_err(|e| malformed(&e.to_string()))?;

        Ok(Self {
            raw: value.to_owned(),
            timestamp,
        })
    }

    /// 타임스탬프로부터 태스크 ID를 만듭니다 (밀리초 미만은 버림).
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        let raw = timestamp.format(TASK_ID_FORMAT).to_string();
        // 밀리초 단위로 정규화
        let timestamp = NaiveDateTime::parse_from_str(&raw, TASK_ID_FORMAT).unwrap_or(timestamp);
        Self { raw, timestamp }
    }

    /// 원본 문자열
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 내장된 작업 시각
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TaskId {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// 로그 행 수준
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    /// 로그 표기 문자열에서 변환합니다.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Debug => "debug",
        }
    }
}

/// 로그 행을 출력한 프로그램
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogSource {
    /// 트랜스코딩 도구 본체
    #[serde(rename = "AMT")]
    Amt,
    /// 인코더 백엔드
    #[serde(rename = "FFMPEG")]
    Ffmpeg,
}

impl LogSource {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "AMT" => Some(Self::Amt),
            "FFMPEG" => Some(Self::Ffmpeg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amt => "AMT",
            Self::Ffmpeg => "FFMPEG",
        }
    }
}

/// 작업 처리 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// TS 분석
    TsAnalysis,
    /// 로고 분석
    LogoAnalysis,
    /// 인코딩
    Encode,
    /// 다중화
    Mux,
}

impl Phase {
    /// 모든 단계 (진행 순서)
    pub const ALL: [Phase; 4] = [
        Phase::TsAnalysis,
        Phase::LogoAnalysis,
        Phase::Encode,
        Phase::Mux,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TsAnalysis => "ts_analysis",
            Self::LogoAnalysis => "logo_analysis",
            Self::Encode => "encode",
            Self::Mux => "mux",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 단계 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// 단계별 진행 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    /// 상태
    pub status: PhaseStatus,
    /// 소요 시간 (초, 보고되는 단계만)
    pub duration: Option<f64>,
}

/// 모든 단계가 `not_started`인 단계 맵을 만듭니다.
pub fn initial_phases() -> BTreeMap<Phase, PhaseInfo> {
    Phase::ALL
        .iter()
        .map(|phase| (*phase, PhaseInfo::default()))
        .collect()
}

/// 로그 수준별 집계와 치명 메시지 목록
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub info_count: u64,
    pub warn_count: u64,
    pub error_count: u64,
    pub debug_count: u64,
    /// 치명 패턴에 매칭된 메시지 (발견 순서)
    pub critical_errors: Vec<String>,
}

impl ErrorSummary {
    /// 수준별 카운터를 1 증가시킵니다.
    pub fn record(&mut self, level: LogLevel) {
        match level {
            LogLevel::Info => self.info_count += 1,
            LogLevel::Warn => self.warn_count += 1,
            LogLevel::Error => self.error_count += 1,
            LogLevel::Debug => self.debug_count += 1,
        }
    }

    /// 전송용 카운트 맵
    pub fn counts(&self) -> ErrorCounts {
        ErrorCounts {
            info: self.info_count,
            warn: self.warn_count,
            error: self.error_count,
            debug: self.debug_count,
        }
    }
}

/// 전송 페이로드의 `error_counts` 객체
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub info: u64,
    pub warn: u64,
    pub error: u64,
    pub debug: u64,
}

/// 작업 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Warning,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이벤트 심각도
///
/// `Info < Warning < Critical` 순서를 가집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 전송 대상 싱크
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// HTTP 로그 수집기
    Vector,
    /// syslog 수집기 (치명 이벤트 전용)
    Syslog,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Syslog => "syslog",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 로그 수집기 라벨 세트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLabels {
    pub service: String,
    pub environment: String,
    pub host: String,
    pub status: EventStatus,
    pub severity: Severity,
    pub encoder: String,
}

/// 싱크로 전송되는 통합 이벤트
///
/// 텍스트 로그와 메타데이터를 합친 결과이며, JSON 직렬화 형태가
/// 그대로 HTTP 싱크의 요청 본문이 됩니다.
/// `labels.status`와 `labels.severity`는 항상 함께 결정됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedEvent {
    /// 작업 시각 (태스크 ID에서 파생)
    #[serde(with = "event_timestamp")]
    pub timestamp: NaiveDateTime,
    /// 요약 메시지
    pub message: String,
    pub labels: EventLabels,
    pub task_id: TaskId,
    pub program_name: String,
    pub src_path: String,
    pub out_path: Option<String>,
    pub src_filesize: u64,
    pub out_filesize: u64,
    /// 입력 크기 / 출력 크기 (소수점 2자리)
    pub compression_ratio: f64,
    pub src_duration: f64,
    pub out_duration: f64,
    pub duration_diff: f64,
    pub encoder: String,
    pub format: String,
    pub error_message: Option<String>,
    pub error_counts: ErrorCounts,
    pub phases: BTreeMap<Phase, PhaseInfo>,
    pub command_line: String,
}

impl IntegratedEvent {
    /// syslog 싱크 대상 여부
    pub fn is_critical(&self) -> bool {
        self.labels.severity == Severity::Critical
    }
}

mod event_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::EVENT_TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(EVENT_TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, EVENT_TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn task_id_parses_valid_stem() {
        let id = TaskId::parse("2025-10-19_131358.440").unwrap();
        assert_eq!(id.as_str(), "2025-10-19_131358.440");
        assert_eq!(
            id.timestamp().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            "2025-10-19 13:13:58.440"
        );
    }

    #[test]
    fn task_id_rejects_bad_shapes() {
        for bad in [
            "",
            "2025-10-19 131358.440",
            "2025-10-19_131358",
            "2025-10-19_131358.44",
            "2025-10-19_131358.4400",
            "2025/10/19_131358.440",
            "abcd-10-19_131358.440",
        ] {
            assert!(TaskId::parse(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn task_id_rejects_impossible_time() {
        assert!(TaskId::parse("2025-02-30_120000.000").is_err());
        assert!(TaskId::parse("2025-10-19_256000.000").is_err());
    }

    #[test]
    fn task_id_serializes_as_string() {
        let id = TaskId::parse("2025-10-18_120000.000").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"2025-10-18_120000.000\"");
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn initial_phases_are_not_started() {
        let phases = initial_phases();
        assert_eq!(phases.len(), 4);
        assert!(
            phases
                .values()
                .all(|p| p.status == PhaseStatus::NotStarted && p.duration.is_none())
        );
    }

    #[test]
    fn error_summary_counts_by_level() {
        let mut summary = ErrorSummary::default();
        summary.record(LogLevel::Warn);
        summary.record(LogLevel::Warn);
        summary.record(LogLevel::Error);
        let counts = summary.counts();
        assert_eq!(counts.warn, 2);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.info, 0);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn phase_map_serializes_with_snake_case_keys() {
        let json = serde_json::to_value(initial_phases()).unwrap();
        assert_eq!(json["ts_analysis"]["status"], "not_started");
        assert!(json["mux"]["duration"].is_null());
    }

    proptest! {
        #[test]
        fn task_id_round_trips(
            year in 1970i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
            second in 0u32..60,
            milli in 0u32..1000,
        ) {
            let raw = format!(
                "{year:04}-{month:02}-{day:02}_{hour:02}{minute:02}{second:02}.{milli:03}"
            );
            let id = TaskId::parse(&raw).unwrap();
            let rebuilt = TaskId::from_timestamp(id.timestamp());
            prop_assert_eq!(rebuilt.as_str(), raw.as_str());
            prop_assert_eq!(rebuilt, id);
        }
    }
}
