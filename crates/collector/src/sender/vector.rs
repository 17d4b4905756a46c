//! HTTP JSON 싱크

use std::time::Duration;

use amtlog_core::config::VectorConfig;
use amtlog_core::types::{IntegratedEvent, SinkKind};

use super::EventSink;
use crate::error::CollectorError;

/// 통합 이벤트를 JSON 본문으로 POST 합니다.
///
/// 2xx 이외의 응답은 모두 전송 실패입니다.
#[derive(Debug, Clone)]
pub struct VectorSender {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl VectorSender {
    /// # Errors
    /// HTTP 클라이언트를 만들 수 없으면 [`CollectorError::Config`]
    pub fn new(
        endpoint: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CollectorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("amtlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CollectorError::Config {
                field: "vector".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &VectorConfig) -> Result<Self, CollectorError> {
        Self::new(
            config.endpoint.clone(),
            Some(config.auth_token.clone()),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EventSink for VectorSender {
    fn kind(&self) -> SinkKind {
        SinkKind::Vector
    }

    async fn send(&self, event: &IntegratedEvent) -> Result<(), CollectorError> {
        let mut request = self.client.post(&self.endpoint).json(event);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| delivery_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(delivery_error(format!("HTTP {status}")));
        }

        tracing::trace!(task_id = %event.task_id, status = status.as_u16(), "vector accepted event");
        Ok(())
    }
}

fn delivery_error(reason: String) -> CollectorError {
    CollectorError::Delivery {
        sink: SinkKind::Vector.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use amtlog_core::types::Severity;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::sender::fixtures::event;

    /// 요청 하나를 받아 주어진 상태로 응답하고, 받은 요청 원문을 돌려줍니다.
    async fn serve_once(status_line: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/amatsukaze", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });

        (url, handle)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        buf.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn posts_json_with_bearer_token() {
        let (url, server) = serve_once("200 OK").await;
        let sender =
            VectorSender::new(url, Some("s3cret".to_owned()), Duration::from_secs(5)).unwrap();

        sender.send(&event(Severity::Critical)).await.unwrap();

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /amatsukaze"));
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("authorization: bearer s3cret"));
        assert!(request.contains("\"task_id\":\"2025-10-18_120000.000\""));
        assert!(request.contains("\"severity\":\"critical\""));
    }

    #[tokio::test]
    async fn empty_token_sends_no_authorization() {
        let (url, server) = serve_once("204 No Content").await;
        let sender = VectorSender::new(url, Some(String::new()), Duration::from_secs(5)).unwrap();

        sender.send(&event(Severity::Info)).await.unwrap();
        let request = server.await.unwrap();
        assert!(!request.to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn non_2xx_is_delivery_failure() {
        let (url, server) = serve_once("500 Internal Server Error").await;
        let sender = VectorSender::new(url, None, Duration::from_secs(5)).unwrap();

        let err = sender.send(&event(Severity::Info)).await.unwrap_err();
        assert!(matches!(err, CollectorError::Delivery { ref sink, ref reason } if sink == "vector" && reason.contains("500")));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_delivery_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sender =
            VectorSender::new(format!("http://{addr}/"), None, Duration::from_secs(2)).unwrap();
        let err = sender.send(&event(Severity::Info)).await.unwrap_err();
        assert!(matches!(err, CollectorError::Delivery { .. }));
    }
}
