//! 수집기 설정
//!
//! [`CollectorConfig`]는 core의 [`AmtlogConfig`]에서 수집기가 쓰는 부분을 뽑아
//! 시간 값을 [`Duration`]으로 바꾼 실행용 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use amtlog_core::config::AmtlogConfig;
//! use amtlog_collector::config::CollectorConfig;
//!
//! let core_config = AmtlogConfig::default();
//! let config = CollectorConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use amtlog_core::config::{
    AmtlogConfig, CriticalRuleConfig, LedgerConfig, ParserConfig, SUPPORTED_ENCODINGS,
    SyslogConfig, SyslogProtocol, VectorConfig,
};

use crate::error::CollectorError;
use crate::watcher::PairWatcherConfig;

/// 수집기 실행 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 감시 디렉토리
    pub log_directory: PathBuf,
    /// `.txt` 대기 제한 시간
    pub wait_timeout: Duration,
    /// `.txt` 존재 확인 간격
    pub poll_interval: Duration,
    /// 이벤트 라벨 environment
    pub environment: String,
    /// 이벤트 라벨 host (비어 있으면 머신 호스트명)
    pub host: String,
    pub parser: ParserConfig,
    pub vector: VectorConfig,
    pub syslog: SyslogConfig,
    pub ledger: LedgerConfig,
    /// 재시도 스윕 주기
    pub retry_interval: Duration,
    /// 보존 기간 스윕 주기
    pub sweep_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::from_core(&AmtlogConfig::default())
    }
}

impl CollectorConfig {
    pub fn from_core(core: &AmtlogConfig) -> Self {
        Self {
            log_directory: PathBuf::from(&core.watcher.log_directory),
            wait_timeout: Duration::from_secs(core.watcher.txt_wait_timeout_secs),
            poll_interval: Duration::from_millis(core.watcher.poll_interval_ms),
            environment: core.general.environment.clone(),
            host: core.general.host.clone(),
            parser: core.parser.clone(),
            vector: core.vector.clone(),
            syslog: core.syslog.clone(),
            ledger: core.ledger.clone(),
            retry_interval: Duration::from_secs(core.ledger.retry_interval_secs),
            sweep_interval: Duration::from_secs(core.ledger.sweep_interval_secs),
        }
    }

    /// 이벤트 라벨에 쓸 호스트명
    pub fn resolved_host(&self) -> String {
        if !self.host.is_empty() {
            return self.host.clone();
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_owned())
    }

    pub fn watcher_config(&self) -> PairWatcherConfig {
        PairWatcherConfig::new(&self.log_directory, self.wait_timeout, self.poll_interval)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.log_directory.as_os_str().is_empty() {
            return Err(config_error("log_directory", "must not be empty"));
        }
        if self.wait_timeout.is_zero() {
            return Err(config_error("wait_timeout", "must be greater than 0"));
        }
        if self.poll_interval.is_zero() || self.poll_interval > self.wait_timeout {
            return Err(config_error(
                "poll_interval",
                "must be greater than 0 and not exceed the wait timeout",
            ));
        }
        if !SUPPORTED_ENCODINGS.contains(&self.parser.encoding.to_ascii_lowercase().as_str()) {
            return Err(config_error(
                "parser.encoding",
                format!("must be one of: {}", SUPPORTED_ENCODINGS.join(", ")),
            ));
        }
        if self.parser.max_log_lines == 0 {
            return Err(config_error("parser.max_log_lines", "must be greater than 0"));
        }
        if self.syslog.enabled && SyslogProtocol::from_str(&self.syslog.protocol).is_err() {
            return Err(config_error("syslog.protocol", "must be one of: udp, tcp"));
        }
        if self.ledger.path.is_empty() {
            return Err(config_error("ledger.path", "must not be empty"));
        }
        if self.retry_interval.is_zero() || self.sweep_interval.is_zero() {
            return Err(config_error(
                "ledger",
                "retry and sweep intervals must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> CollectorError {
    CollectorError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 수집기 설정 빌더
#[derive(Default)]
pub struct CollectorConfigBuilder {
    config: CollectorConfig,
}

impl CollectorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_directory = dir.into();
        self
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.wait_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn ledger_path(mut self, path: impl Into<String>) -> Self {
        self.config.ledger.path = path.into();
        self
    }

    pub fn critical_rules(mut self, rules: Vec<CriticalRuleConfig>) -> Self {
        self.config.parser.critical_rules = rules;
        self
    }

    pub fn vector(mut self, vector: VectorConfig) -> Self {
        self.config.vector = vector;
        self
    }

    pub fn syslog(mut self, syslog: SyslogConfig) -> Self {
        self.config.syslog = syslog;
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// 설정을 검증하고 [`CollectorConfig`]를 만듭니다.
    pub fn build(self) -> Result<CollectorConfig, CollectorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        CollectorConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_converts_durations() {
        let mut core = AmtlogConfig::default();
        core.watcher.txt_wait_timeout_secs = 45;
        core.watcher.poll_interval_ms = 250;
        core.general.environment = "staging".to_owned();

        let config = CollectorConfig::from_core(&core);
        assert_eq!(config.wait_timeout, Duration::from_secs(45));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.environment, "staging");
        assert_eq!(config.retry_interval, Duration::from_secs(300));
    }

    #[test]
    fn explicit_host_wins() {
        let config = CollectorConfigBuilder::new().host("encoder01").build().unwrap();
        assert_eq!(config.resolved_host(), "encoder01");
        assert!(!CollectorConfig::default().resolved_host().is_empty());
    }

    #[test]
    fn poll_interval_must_not_exceed_timeout() {
        let result = CollectorConfigBuilder::new()
            .wait_timeout(Duration::from_millis(100))
            .poll_interval(Duration::from_millis(200))
            .build();
        assert!(matches!(result, Err(CollectorError::Config { ref field, .. }) if field == "poll_interval"));
    }

    #[test]
    fn rejects_unknown_syslog_protocol() {
        let syslog = SyslogConfig {
            protocol: "sctp".to_owned(),
            ..Default::default()
        };
        assert!(CollectorConfigBuilder::new().syslog(syslog).build().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let config = CollectorConfigBuilder::new()
            .log_directory("/srv/amt/logs")
            .wait_timeout(Duration::from_millis(500))
            .poll_interval(Duration::from_millis(10))
            .ledger_path("/tmp/ledger.db")
            .build()
            .unwrap();
        let watcher = config.watcher_config();
        assert_eq!(watcher.directory, PathBuf::from("/srv/amt/logs"));
        assert_eq!(watcher.wait_timeout, Duration::from_millis(500));
        assert_eq!(config.ledger.path, "/tmp/ledger.db");
    }
}
