//! 설정 관리 — amtlog.toml 파싱 및 런타임 설정
//!
//! [`AmtlogConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`AMTLOG_WATCHER_LOG_DIRECTORY=/logs` 형식)
//! 3. 설정 파일 (`amtlog.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), amtlog_core::error::AmtlogError> {
//! use amtlog_core::config::AmtlogConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = AmtlogConfig::load("amtlog.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = AmtlogConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AmtlogError, ConfigError};

/// 지원하는 텍스트 로그 인코딩
pub const SUPPORTED_ENCODINGS: [&str; 2] = ["utf-8", "utf-8-sig"];

/// 원장 보존 기간 상한 (일)
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// amtlog 통합 설정
///
/// `amtlog.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmtlogConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 디렉토리 감시 설정
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// 파서 및 치명 규칙 설정
    #[serde(default)]
    pub parser: ParserConfig,
    /// HTTP 싱크 설정
    #[serde(default)]
    pub vector: VectorConfig,
    /// syslog 싱크 설정
    #[serde(default)]
    pub syslog: SyslogConfig,
    /// 전송 원장 설정
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AmtlogConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AmtlogError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AmtlogError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AmtlogError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                AmtlogError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, AmtlogError> {
        toml::from_str(toml_str).map_err(|e| {
            AmtlogError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `AMTLOG_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "AMTLOG_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "AMTLOG_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.environment, "AMTLOG_GENERAL_ENVIRONMENT");
        override_string(&mut self.general.host, "AMTLOG_GENERAL_HOST");
        override_string(&mut self.general.pid_file, "AMTLOG_GENERAL_PID_FILE");

        // Watcher
        override_string(
            &mut self.watcher.log_directory,
            "AMTLOG_WATCHER_LOG_DIRECTORY",
        );
        override_number(
            &mut self.watcher.txt_wait_timeout_secs,
            "AMTLOG_WATCHER_TXT_WAIT_TIMEOUT_SECS",
        );
        override_number(
            &mut self.watcher.poll_interval_ms,
            "AMTLOG_WATCHER_POLL_INTERVAL_MS",
        );

        // Parser
        override_string(&mut self.parser.encoding, "AMTLOG_PARSER_ENCODING");
        override_number(&mut self.parser.max_log_lines, "AMTLOG_PARSER_MAX_LOG_LINES");
        override_string(&mut self.parser.rule_dir, "AMTLOG_PARSER_RULE_DIR");

        // Vector
        override_bool(&mut self.vector.enabled, "AMTLOG_VECTOR_ENABLED");
        override_string(&mut self.vector.endpoint, "AMTLOG_VECTOR_ENDPOINT");
        override_string(&mut self.vector.auth_token, "AMTLOG_VECTOR_AUTH_TOKEN");
        override_number(&mut self.vector.timeout_secs, "AMTLOG_VECTOR_TIMEOUT_SECS");
        override_number(&mut self.vector.retry_max, "AMTLOG_VECTOR_RETRY_MAX");
        override_number(
            &mut self.vector.retry_backoff_base_secs,
            "AMTLOG_VECTOR_RETRY_BACKOFF_BASE_SECS",
        );

        // Syslog
        override_bool(&mut self.syslog.enabled, "AMTLOG_SYSLOG_ENABLED");
        override_string(&mut self.syslog.host, "AMTLOG_SYSLOG_HOST");
        override_number(&mut self.syslog.port, "AMTLOG_SYSLOG_PORT");
        override_string(&mut self.syslog.protocol, "AMTLOG_SYSLOG_PROTOCOL");
        override_number(&mut self.syslog.timeout_secs, "AMTLOG_SYSLOG_TIMEOUT_SECS");

        // Ledger
        override_string(&mut self.ledger.path, "AMTLOG_LEDGER_PATH");
        override_number(
            &mut self.ledger.retention_days,
            "AMTLOG_LEDGER_RETENTION_DAYS",
        );
        override_number(
            &mut self.ledger.retry_interval_secs,
            "AMTLOG_LEDGER_RETRY_INTERVAL_SECS",
        );
        override_number(
            &mut self.ledger.sweep_interval_secs,
            "AMTLOG_LEDGER_SWEEP_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "AMTLOG_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "AMTLOG_METRICS_LISTEN_ADDR");
        override_number(&mut self.metrics.port, "AMTLOG_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 규칙의 정규식/조건식 컴파일 검증은 수집기 크레이트에서 수행합니다.
    pub fn validate(&self) -> Result<(), AmtlogError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.validate_watcher()?;
        self.validate_parser()?;
        self.validate_sinks()?;

        if self.ledger.path.is_empty() {
            return Err(invalid("ledger.path", "must not be empty"));
        }
        if self.ledger.retention_days == 0 || self.ledger.retention_days > MAX_RETENTION_DAYS {
            return Err(invalid(
                "ledger.retention_days",
                format!("must be 1-{MAX_RETENTION_DAYS}"),
            ));
        }
        if self.ledger.retry_interval_secs == 0 {
            return Err(invalid("ledger.retry_interval_secs", "must be greater than 0"));
        }
        if self.ledger.sweep_interval_secs == 0 {
            return Err(invalid("ledger.sweep_interval_secs", "must be greater than 0"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must not be 0 when metrics are enabled"));
        }

        Ok(())
    }

    fn validate_watcher(&self) -> Result<(), AmtlogError> {
        const MAX_WAIT_TIMEOUT_SECS: u64 = 3600;

        if self.watcher.log_directory.is_empty() {
            return Err(invalid("watcher.log_directory", "must not be empty"));
        }
        if self.watcher.txt_wait_timeout_secs == 0
            || self.watcher.txt_wait_timeout_secs > MAX_WAIT_TIMEOUT_SECS
        {
            return Err(invalid(
                "watcher.txt_wait_timeout_secs",
                format!("must be 1-{MAX_WAIT_TIMEOUT_SECS}"),
            ));
        }
        if self.watcher.poll_interval_ms == 0
            || self.watcher.poll_interval_ms > self.watcher.txt_wait_timeout_secs * 1000
        {
            return Err(invalid(
                "watcher.poll_interval_ms",
                "must be greater than 0 and not exceed the wait timeout",
            ));
        }
        Ok(())
    }

    fn validate_parser(&self) -> Result<(), AmtlogError> {
        const MAX_LOG_LINES: usize = 1_000_000;

        if !SUPPORTED_ENCODINGS.contains(&self.parser.encoding.to_ascii_lowercase().as_str()) {
            return Err(invalid(
                "parser.encoding",
                format!("must be one of: {}", SUPPORTED_ENCODINGS.join(", ")),
            ));
        }
        if self.parser.max_log_lines == 0 || self.parser.max_log_lines > MAX_LOG_LINES {
            return Err(invalid(
                "parser.max_log_lines",
                format!("must be 1-{MAX_LOG_LINES}"),
            ));
        }

        let mut seen = HashSet::new();
        for (idx, rule) in self.parser.critical_rules.iter().enumerate() {
            rule.validate()
                .map_err(|reason| invalid(&format!("parser.critical_rules[{idx}]"), reason))?;
            if !seen.insert(rule.name.as_str()) {
                return Err(invalid(
                    &format!("parser.critical_rules[{idx}].name"),
                    format!("duplicate rule name '{}'", rule.name),
                ));
            }
        }
        Ok(())
    }

    fn validate_sinks(&self) -> Result<(), AmtlogError> {
        if self.vector.enabled {
            if !(self.vector.endpoint.starts_with("http://")
                || self.vector.endpoint.starts_with("https://"))
            {
                return Err(invalid(
                    "vector.endpoint",
                    "must be an http:// or https:// URL",
                ));
            }
            if self.vector.timeout_secs == 0 {
                return Err(invalid("vector.timeout_secs", "must be greater than 0"));
            }
        }
        if self.vector.retry_backoff_base_secs == 0 {
            return Err(invalid(
                "vector.retry_backoff_base_secs",
                "must be greater than 0",
            ));
        }

        if self.syslog.enabled {
            if self.syslog.host.is_empty() {
                return Err(invalid("syslog.host", "must not be empty"));
            }
            if self.syslog.port == 0 {
                return Err(invalid("syslog.port", "must not be 0"));
            }
            if SyslogProtocol::from_str(&self.syslog.protocol).is_err() {
                return Err(invalid("syslog.protocol", "must be one of: udp, tcp"));
            }
            if self.syslog.timeout_secs == 0 {
                return Err(invalid("syslog.timeout_secs", "must be greater than 0"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> AmtlogError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 이벤트 라벨의 environment 값
    pub environment: String,
    /// 이벤트 라벨의 host 값 (비어 있으면 머신 호스트명)
    pub host: String,
    /// PID 파일 경로 (비어 있으면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            environment: "production".to_owned(),
            host: String::new(),
            pid_file: String::new(),
        }
    }
}

/// 디렉토리 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// 감시할 로그 디렉토리 (비재귀)
    pub log_directory: String,
    /// `.json` 생성 후 `.txt`를 기다리는 최대 시간 (초)
    pub txt_wait_timeout_secs: u64,
    /// `.txt` 존재 확인 주기 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_directory: "/logs".to_owned(),
            txt_wait_timeout_secs: 30,
            poll_interval_ms: 1000,
        }
    }
}

/// 파서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// 텍스트 로그 인코딩 (utf-8, utf-8-sig)
    pub encoding: String,
    /// 읽을 최대 행 수 (초과분은 무시)
    pub max_log_lines: usize,
    /// 추가 규칙 YAML 디렉토리 (비어 있으면 사용하지 않음)
    pub rule_dir: String,
    /// 인라인 치명 규칙
    pub critical_rules: Vec<CriticalRuleConfig>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            encoding: "utf-8-sig".to_owned(),
            max_log_lines: 10_000,
            rule_dir: String::new(),
            critical_rules: Vec::new(),
        }
    }
}

/// 치명 규칙 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// 메시지에 대한 정규식
    #[default]
    Pattern,
    /// 메타데이터 필드에 대한 조건식
    Condition,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => f.write_str("pattern"),
            Self::Condition => f.write_str("condition"),
        }
    }
}

/// 운영자 정의 치명 규칙
///
/// ```toml
/// [[parser.critical_rules]]
/// name = "audio_drift"
/// type = "condition"
/// condition = "audiodiff.maxdiff > 100 and audiodiff.maxdiff < 200"
/// message = "audio drift out of range"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalRuleConfig {
    /// 규칙 이름 (고유)
    pub name: String,
    /// 규칙 종류
    #[serde(rename = "type", default)]
    pub kind: RuleKind,
    /// 정규식 (pattern 규칙)
    #[serde(default)]
    pub pattern: Option<String>,
    /// 조건식 (condition 규칙)
    #[serde(default)]
    pub condition: Option<String>,
    /// 대소문자 구분 여부 (pattern 규칙)
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 매칭 시 기록할 메시지
    #[serde(default)]
    pub message: Option<String>,
}

impl CriticalRuleConfig {
    /// 규칙의 형태를 검증합니다.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("rule name must not be empty".to_owned());
        }
        match self.kind {
            RuleKind::Pattern if self.pattern.as_deref().is_none_or(str::is_empty) => Err(
                format!("pattern rule '{}' requires a non-empty 'pattern'", self.name),
            ),
            RuleKind::Condition if self.condition.as_deref().is_none_or(str::is_empty) => Err(
                format!(
                    "condition rule '{}' requires a non-empty 'condition'",
                    self.name
                ),
            ),
            _ => Ok(()),
        }
    }
}

fn default_true() -> bool {
    true
}

/// HTTP 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 엔드포인트 URL
    pub endpoint: String,
    /// Bearer 토큰 (비어 있으면 인증 헤더 없음)
    pub auth_token: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 재시도 최대 횟수 (원장 retry_count 상한)
    pub retry_max: u32,
    /// 재시도 지수 백오프 밑 (초)
    pub retry_backoff_base_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://vector:9000/amatsukaze".to_owned(),
            auth_token: String::new(),
            timeout_secs: 10,
            retry_max: 5,
            retry_backoff_base_secs: 2,
        }
    }
}

/// syslog 전송 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogProtocol {
    /// 단일 데이터그램
    Udp,
    /// octet-counting 프레이밍 (RFC 6587)
    Tcp,
}

impl FromStr for SyslogProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            other => Err(ConfigError::InvalidValue {
                field: "syslog.protocol".to_owned(),
                reason: format!("unsupported protocol '{other}'"),
            }),
        }
    }
}

impl fmt::Display for SyslogProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// syslog 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 호스트
    pub host: String,
    /// 수신 포트
    pub port: u16,
    /// 프로토콜 (udp, tcp)
    pub protocol: String,
    /// TCP 연결/쓰기 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "rsyslogd".to_owned(),
            port: 514,
            protocol: "udp".to_owned(),
            timeout_secs: 5,
        }
    }
}

/// 전송 원장 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite 파일 경로
    pub path: String,
    /// 레코드 보존 기간 (일)
    pub retention_days: u32,
    /// 재시도 스윕 주기 (초)
    pub retry_interval_secs: u64,
    /// 보존 기간 스윕 주기 (초)
    pub sweep_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "/data/processed_logs.db".to_owned(),
            retention_days: 30,
            retry_interval_secs: 300,
            sweep_interval_secs: 86_400,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_number<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse number from env var, ignoring"
            ),
        }
    }
}
