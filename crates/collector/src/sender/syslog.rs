//! RFC 3164 syslog 싱크
//!
//! 메시지 형식: `<PRI>Mmm dd HH:MM:SS HOSTNAME TAG: CRITICAL: [program] - error`
//!
//! - PRI는 facility user(1), severity error(3)로 고정 (`1 * 8 + 3 = 11`)
//! - 타임스탬프는 UTC
//! - UDP는 데이터그램 하나, TCP는 RFC 6587 octet counting (`"<len> <msg>"`, 후행 구분자 없음)

use std::net::SocketAddr;
use std::time::Duration;

use amtlog_core::config::{SyslogConfig, SyslogProtocol};
use amtlog_core::types::{IntegratedEvent, SinkKind};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

use super::EventSink;
use crate::error::CollectorError;

/// facility user(1) * 8 + severity error(3)
pub const SYSLOG_PRIORITY: u8 = 11;

/// syslog TAG 필드
pub const SYSLOG_TAG: &str = "amatsukaze";

const DEFAULT_ERROR_TEXT: &str = "エンコード失敗";
const RFC3164_TIMESTAMP: &str = "%b %d %H:%M:%S";

/// syslog 메시지 한 줄을 만듭니다.
pub fn format_syslog_message(
    program_name: &str,
    error_message: Option<&str>,
    hostname: &str,
    now: DateTime<Utc>,
) -> String {
    format!(
        "<{SYSLOG_PRIORITY}>{} {hostname} {SYSLOG_TAG}: CRITICAL: [{program_name}] - {}",
        now.format(RFC3164_TIMESTAMP),
        error_message.unwrap_or(DEFAULT_ERROR_TEXT),
    )
}

/// octet counting 프레임: 10진수 바이트 길이, 공백 하나, 메시지
pub fn frame_octet_counted(message: &str) -> Bytes {
    let len = message.len().to_string();
    let mut buf = BytesMut::with_capacity(len.len() + 1 + message.len());
    buf.put_slice(len.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(message.as_bytes());
    buf.freeze()
}

/// 치명 이벤트를 syslog 수집기로 보냅니다.
#[derive(Debug, Clone)]
pub struct SyslogSender {
    host: String,
    port: u16,
    protocol: SyslogProtocol,
    timeout: Duration,
    /// 생성 시 한 번 결정된 HOSTNAME
    hostname: String,
}

impl SyslogSender {
    pub fn new(host: impl Into<String>, port: u16, protocol: SyslogProtocol, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            timeout,
            hostname: local_hostname(),
        }
    }

    /// # Errors
    /// 알 수 없는 프로토콜은 [`CollectorError::Config`]
    pub fn from_config(config: &SyslogConfig) -> Result<Self, CollectorError> {
        let protocol: SyslogProtocol =
            config
                .protocol
                .parse()
                .map_err(|e: amtlog_core::error::ConfigError| CollectorError::Config {
                    field: "syslog.protocol".to_owned(),
                    reason: e.to_string(),
                })?;
        Ok(Self::new(
            config.host.clone(),
            config.port,
            protocol,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    /// HOSTNAME 필드를 고정합니다.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn protocol(&self) -> SyslogProtocol {
        self.protocol
    }

    pub fn message_for(&self, event: &IntegratedEvent, now: DateTime<Utc>) -> String {
        format_syslog_message(
            &event.program_name,
            event.error_message.as_deref(),
            &self.hostname,
            now,
        )
    }

    async fn resolve(&self) -> Result<SocketAddr, CollectorError> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| delivery_error(format!("cannot resolve {}:{}: {e}", self.host, self.port)))?;
        addrs
            .next()
            .ok_or_else(|| delivery_error(format!("no address for {}:{}", self.host, self.port)))
    }

    async fn send_udp(&self, message: &str) -> Result<(), CollectorError> {
        let target = self.resolve().await?;
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| delivery_error(format!("udp bind failed: {e}")))?;
        socket
            .send_to(message.as_bytes(), target)
            .await
            .map_err(|e| delivery_error(format!("udp send to {target} failed: {e}")))?;
        Ok(())
    }

    async fn send_tcp(&self, message: &str) -> Result<(), CollectorError> {
        let target = self.resolve().await?;
        let mut stream = timeout(self.timeout, TcpStream::connect(target))
            .await
            .map_err(|_| delivery_error(format!("tcp connect to {target} timed out")))?
            .map_err(|e| delivery_error(format!("tcp connect to {target} failed: {e}")))?;

        let frame = frame_octet_counted(message);
        timeout(self.timeout, async {
            stream.write_all(&frame).await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| delivery_error(format!("tcp write to {target} timed out")))?
        .map_err(|e| delivery_error(format!("tcp write to {target} failed: {e}")))?;
        Ok(())
    }
}

impl EventSink for SyslogSender {
    fn kind(&self) -> SinkKind {
        SinkKind::Syslog
    }

    async fn send(&self, event: &IntegratedEvent) -> Result<(), CollectorError> {
        if !event.is_critical() {
            tracing::debug!(task_id = %event.task_id, "non-critical event, syslog skipped");
            return Ok(());
        }

        let message = self.message_for(event, Utc::now());
        match self.protocol {
            SyslogProtocol::Udp => self.send_udp(&message).await?,
            SyslogProtocol::Tcp => self.send_tcp(&message).await?,
        }
        tracing::info!(task_id = %event.task_id, protocol = %self.protocol, "syslog alert sent");
        Ok(())
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

fn delivery_error(reason: String) -> CollectorError {
    CollectorError::Delivery {
        sink: SinkKind::Syslog.to_string(),
        reason,
    }
}
