//! 싱크 전송 -- 통합 이벤트를 HTTP 수집기와 syslog 수집기로 보냅니다.
//!
//! # 구성
//! - [`EventSink`]: 싱크 하나의 전송 trait
//! - [`VectorSender`]: HTTP JSON POST 싱크
//! - [`SyslogSender`]: RFC 3164 syslog 싱크 (치명 이벤트 전용)
//! - [`DeliveryCoordinator`]: 두 싱크를 독립적으로 시도하고 결과를 보고
//!
//! 코디네이터는 재시도를 결정하지 않습니다. 결과는 호출자가 원장에 기록합니다.

pub mod syslog;
pub mod vector;

pub use syslog::{SyslogSender, format_syslog_message};
pub use vector::VectorSender;

use std::future::Future;

use amtlog_core::metrics as m;
use amtlog_core::types::{IntegratedEvent, SinkKind};

use crate::error::CollectorError;

/// 이벤트 싱크
///
/// 구현체는 클라이언트/소켓 자원을 직접 소유합니다.
pub trait EventSink: Send + Sync {
    /// 싱크 종류
    fn kind(&self) -> SinkKind;

    /// 이벤트 하나를 전송합니다.
    ///
    /// # Errors
    /// 네트워크/프로토콜 실패는 [`CollectorError::Delivery`]
    fn send(
        &self,
        event: &IntegratedEvent,
    ) -> impl Future<Output = Result<(), CollectorError>> + Send;
}

/// 이번 전송에서 시도할 싱크
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPlan {
    pub vector: bool,
    pub syslog: bool,
}

impl DeliveryPlan {
    /// 두 싱크 모두 시도
    pub const fn all() -> Self {
        Self {
            vector: true,
            syslog: true,
        }
    }

    /// 이미 전송된 싱크를 건너뛰는 계획
    pub const fn skip_delivered(vector_delivered: bool, syslog_delivered: bool) -> Self {
        Self {
            vector: !vector_delivered,
            syslog: !syslog_delivered,
        }
    }

    pub fn includes(&self, sink: SinkKind) -> bool {
        match sink {
            SinkKind::Vector => self.vector,
            SinkKind::Syslog => self.syslog,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.vector && !self.syslog
    }
}

impl Default for DeliveryPlan {
    fn default() -> Self {
        Self::all()
    }
}

/// 싱크별 전송 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub vector_ok: bool,
    pub syslog_ok: bool,
    /// 실패한 싱크의 에러 메시지 (`sink: reason`)
    pub errors: Vec<String>,
}

impl DeliveryOutcome {
    pub fn as_tuple(&self) -> (bool, bool) {
        (self.vector_ok, self.syslog_ok)
    }

    pub fn is_complete(&self) -> bool {
        self.vector_ok && self.syslog_ok
    }

    /// 실패 메시지를 하나로 합칩니다. 실패가 없으면 `None`
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

/// 싱크 시도 결과
enum Attempt {
    /// 시도하지 않았지만 성공으로 간주 (이미 전송됨, 대상 아님, 비활성)
    Skipped,
    Sent,
    Failed(String),
}

impl Attempt {
    fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// 전송 코디네이터
///
/// HTTP 싱크는 모든 이벤트에 대해, syslog 싱크는 치명 이벤트에 대해서만 시도합니다.
/// 한 싱크의 실패는 다른 싱크의 시도나 결과에 영향을 주지 않습니다.
/// 설정에서 꺼진 싱크(`None`)는 전송할 대상이 없으므로 성공으로 보고됩니다.
pub struct DeliveryCoordinator<V, S> {
    vector: Option<V>,
    syslog: Option<S>,
}

impl<V: EventSink, S: EventSink> DeliveryCoordinator<V, S> {
    pub fn new(vector: Option<V>, syslog: Option<S>) -> Self {
        Self { vector, syslog }
    }

    pub fn vector(&self) -> Option<&V> {
        self.vector.as_ref()
    }

    pub fn syslog(&self) -> Option<&S> {
        self.syslog.as_ref()
    }

    /// 두 싱크 모두에 전송을 시도합니다.
    pub async fn send(&self, event: &IntegratedEvent) -> DeliveryOutcome {
        self.send_planned(event, DeliveryPlan::all()).await
    }

    /// 계획에 포함된 싱크에만 전송을 시도합니다. 제외된 싱크는 성공으로 보고됩니다.
    pub async fn send_planned(&self, event: &IntegratedEvent, plan: DeliveryPlan) -> DeliveryOutcome {
        let vector = async {
            if !plan.vector {
                return Attempt::Skipped;
            }
            attempt(self.vector.as_ref(), event).await
        };
        let syslog = async {
            if !plan.syslog || !event.is_critical() {
                return Attempt::Skipped;
            }
            attempt(self.syslog.as_ref(), event).await
        };

        let (vector, syslog) = tokio::join!(vector, syslog);

        let mut outcome = DeliveryOutcome {
            vector_ok: vector.is_ok(),
            syslog_ok: syslog.is_ok(),
            errors: Vec::new(),
        };
        for (kind, result) in [(SinkKind::Vector, vector), (SinkKind::Syslog, syslog)] {
            if let Attempt::Failed(reason) = result {
                outcome.errors.push(format!("{kind}: {reason}"));
            }
        }
        outcome
    }
}

async fn attempt<K: EventSink>(sink: Option<&K>, event: &IntegratedEvent) -> Attempt {
    let Some(sink) = sink else {
        return Attempt::Skipped;
    };
    let kind = sink.kind();

    match sink.send(event).await {
        Ok(()) => {
            metrics::counter!(
                m::DELIVERY_ATTEMPTS_TOTAL,
                m::LABEL_SINK => kind.as_str(),
                m::LABEL_RESULT => "success"
            )
            .increment(1);
            tracing::debug!(task_id = %event.task_id, sink = %kind, "event delivered");
            Attempt::Sent
        }
        Err(e) => {
            metrics::counter!(
                m::DELIVERY_ATTEMPTS_TOTAL,
                m::LABEL_SINK => kind.as_str(),
                m::LABEL_RESULT => "failure"
            )
            .increment(1);
            tracing::warn!(task_id = %event.task_id, sink = %kind, error = %e, "delivery failed");
            Attempt::Failed(failure_reason(e))
        }
    }
}

fn failure_reason(err: CollectorError) -> String {
    match err {
        CollectorError::Delivery { reason, .. } => reason,
        other => other.to_string(),
    }
}



#[cfg(test)]
mod tests {
    use amtlog_core::types::Severity;

    use super::fixtures::event;
    use super::mock::MockSink;
    use super::*;

    fn coordinator(
        vector: MockSink,
        syslog: MockSink,
    ) -> DeliveryCoordinator<MockSink, MockSink> {
        DeliveryCoordinator::new(Some(vector), Some(syslog))
    }

    #[tokio::test]
    async fn non_critical_event_skips_syslog() {
        let vector = MockSink::new(SinkKind::Vector);
        let syslog = MockSink::failing(SinkKind::Syslog);
        let coordinator = coordinator(vector.clone(), syslog.clone());

        let outcome = coordinator.send(&event(Severity::Info)).await;
        assert_eq!(outcome.as_tuple(), (true, true));
        assert_eq!(vector.calls(), 1);
        assert_eq!(syslog.calls(), 0);
    }

    #[tokio::test]
    async fn one_sink_failure_does_not_mask_the_other() {
        let vector = MockSink::failing(SinkKind::Vector);
        let syslog = MockSink::new(SinkKind::Syslog);
        let coordinator = coordinator(vector.clone(), syslog.clone());

        let outcome = coordinator.send(&event(Severity::Critical)).await;
        assert_eq!(outcome.as_tuple(), (false, true));
        assert_eq!(syslog.calls(), 1);
        assert_eq!(outcome.errors, vec!["vector: connection refused".to_owned()]);
        assert_eq!(outcome.error_message().as_deref(), Some("vector: connection refused"));
    }

    #[tokio::test]
    async fn both_failures_are_reported() {
        let coordinator = coordinator(
            MockSink::failing(SinkKind::Vector),
            MockSink::failing(SinkKind::Syslog),
        );
        let outcome = coordinator.send(&event(Severity::Critical)).await;
        assert_eq!(outcome.as_tuple(), (false, false));
        assert_eq!(outcome.errors.len(), 2);
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn planned_send_skips_delivered_sinks() {
        let vector = MockSink::new(SinkKind::Vector);
        let syslog = MockSink::new(SinkKind::Syslog);
        let coordinator = coordinator(vector.clone(), syslog.clone());

        let plan = DeliveryPlan::skip_delivered(true, false);
        let outcome = coordinator.send_planned(&event(Severity::Critical), plan).await;
        assert!(outcome.is_complete());
        assert_eq!(vector.calls(), 0);
        assert_eq!(syslog.calls(), 1);
    }

    #[tokio::test]
    async fn disabled_sinks_report_success() {
        let coordinator: DeliveryCoordinator<MockSink, MockSink> =
            DeliveryCoordinator::new(None, None);
        let outcome = coordinator.send(&event(Severity::Critical)).await;
        assert_eq!(outcome.as_tuple(), (true, true));
        assert!(outcome.error_message().is_none());
    }

    #[test]
    fn plan_helpers() {
        assert!(DeliveryPlan::skip_delivered(true, true).is_empty());
        let plan = DeliveryPlan::skip_delivered(false, true);
        assert!(plan.includes(SinkKind::Vector));
        assert!(!plan.includes(SinkKind::Syslog));
        assert_eq!(DeliveryPlan::default(), DeliveryPlan::all());
    }
}
