//! 수집 파이프라인 오케스트레이션 -- 감지/처리/재시도/보존 정리의 전체 흐름을 관리합니다.
//!
//! [`CollectorPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `amtlog-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! PairWatcher --FilePair--> TaskProcessor --> DeliveryCoordinator --> Vector / syslog
//!                                 |
//!                                 +--> Ledger <-- retry loop (retry_interval)
//!                                          ^----- retention loop (sweep_interval)
//! ```

use std::sync::Arc;
use std::time::Duration;

use amtlog_core::error::{AmtlogError, PipelineError};
use amtlog_core::pipeline::{HealthStatus, Pipeline};
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::ledger::Ledger;
use crate::parser::LogParser;
use crate::processor::TaskProcessor;
use crate::retry::{RetryPolicy, retention_sweep, retry_sweep};
use crate::rule::RuleEngine;
use crate::sender::{DeliveryCoordinator, SyslogSender, VectorSender};
use crate::watcher::PairWatcher;

/// 실제 싱크를 쓰는 태스크 처리기
pub type CollectorProcessor = TaskProcessor<VectorSender, SyslogSender>;

/// 백그라운드 루프 종료 대기 시간
const LOOP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Initialized,
    Running,
    Stopped,
}

/// 수집 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use amtlog_collector::{CollectorPipelineBuilder, config::CollectorConfig};
///
/// let mut pipeline = CollectorPipelineBuilder::new()
///     .config(CollectorConfig::from_core(&core_config))
///     .fatal_token(fatal.clone())
///     .build()
///     .await?;
/// pipeline.start().await?;
/// ```
pub struct CollectorPipeline {
    config: CollectorConfig,
    state: PipelineState,
    processor: Arc<CollectorProcessor>,
    watcher: PairWatcher<CollectorProcessor>,
    /// 백그라운드 루프 취소 토큰 (start마다 새로 생성)
    loops_cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    fatal: CancellationToken,
}

impl CollectorPipeline {
    pub fn state_name(&self) -> &'static str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        self.processor.ledger()
    }

    pub fn processor(&self) -> &Arc<CollectorProcessor> {
        &self.processor
    }

    /// 로드된 규칙 수
    pub fn rule_count(&self) -> usize {
        self.processor.parser().rules().len()
    }

    /// 현재 `.txt`를 기다리는 태스크 수
    pub fn pending_count(&self) -> usize {
        self.watcher.pending_count()
    }

    /// 원장 에러 시 취소되는 토큰
    pub fn fatal_token(&self) -> &CancellationToken {
        &self.fatal
    }

    fn spawn_loops(&mut self) {
        let cancel = CancellationToken::new();
        self.loops_cancel = cancel.clone();

        let processor = Arc::clone(&self.processor);
        let pending = self.watcher.pending_set();
        let policy = RetryPolicy::from_config(&self.config.vector);
        let retry_interval = self.config.retry_interval;
        let fatal = self.fatal.clone();
        let retry_cancel = cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(retry_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = retry_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = retry_sweep(processor.as_ref(), &pending, &policy, Utc::now()).await {
                            trip_fatal(&fatal, "retry sweep", &e);
                            break;
                        }
                    }
                }
            }
            tracing::debug!("retry loop exited");
        }));

        let ledger = self.processor.ledger().clone();
        let ledger_config = self.config.ledger.clone();
        let sweep_interval = self.config.sweep_interval;
        let fatal = self.fatal.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = retention_sweep(&ledger, &ledger_config).await {
                            trip_fatal(&fatal, "retention sweep", &e);
                            break;
                        }
                    }
                }
            }
            tracing::debug!("retention loop exited");
        }));
    }
}

fn trip_fatal(fatal: &CancellationToken, operation: &str, err: &CollectorError) {
    if err.is_ledger_error() {
        tracing::error!(operation, error = %err, "ledger unavailable, stopping collector");
        fatal.cancel();
    } else {
        tracing::error!(operation, error = %err, "background loop failed");
    }
}

impl Pipeline for CollectorPipeline {
    async fn start(&mut self) -> Result<(), AmtlogError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(directory = %self.config.log_directory.display(), "starting collector pipeline");
        self.watcher.start().await?;
        self.spawn_loops();

        self.state = PipelineState::Running;
        tracing::info!(rules = self.rule_count(), "collector pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AmtlogError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping collector pipeline");
        self.loops_cancel.cancel();
        self.watcher.stop().await;

        for task in self.tasks.drain(..) {
            if tokio::time::timeout(LOOP_SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!("background loop did not stop in time");
            }
        }

        self.state = PipelineState::Stopped;
        tracing::info!("collector pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.fatal.is_cancelled() {
                    return HealthStatus::Unhealthy("ledger unavailable".to_owned());
                }
                if let Err(e) = self.ledger().ping().await {
                    return HealthStatus::Unhealthy(format!("ledger: {e}"));
                }
                if !self.watcher.is_running() {
                    return HealthStatus::Degraded("directory watcher stopped".to_owned());
                }
                HealthStatus::Healthy
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수집 파이프라인 빌더
///
/// 규칙 컴파일, 싱크 생성, 원장 열기를 수행합니다.
#[derive(Default)]
pub struct CollectorPipelineBuilder {
    config: CollectorConfig,
    ledger: Option<Ledger>,
    fatal: Option<CancellationToken>,
}

impl CollectorPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// 이미 열린 원장을 사용합니다. 지정하지 않으면 `ledger.path`를 엽니다.
    pub fn ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// 원장 에러 시 취소할 토큰. 지정하지 않으면 새로 만듭니다.
    pub fn fatal_token(mut self, token: CancellationToken) -> Self {
        self.fatal = Some(token);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Errors
    /// 설정 검증 실패, 규칙 컴파일 실패, 원장 열기 실패
    pub async fn build(self) -> Result<CollectorPipeline, CollectorError> {
        let config = self.config;
        config.validate()?;

        let rules = Arc::new(RuleEngine::load(&config.parser).await?);
        let parser = LogParser::new(&config.parser, rules)?;

        let vector = if config.vector.enabled {
            Some(VectorSender::from_config(&config.vector)?)
        } else {
            tracing::info!("vector sink disabled");
            None
        };
        let syslog = if config.syslog.enabled {
            Some(SyslogSender::from_config(&config.syslog)?)
        } else {
            tracing::info!("syslog sink disabled");
            None
        };

        let ledger = match self.ledger {
            Some(ledger) => ledger,
            None => Ledger::open(&config.ledger.path).await?,
        };
        let fatal = self.fatal.unwrap_or_default();

        let processor = Arc::new(TaskProcessor::new(
            parser,
            DeliveryCoordinator::new(vector, syslog),
            ledger,
            config.environment.clone(),
            config.resolved_host(),
            fatal.clone(),
        ));
        let watcher = PairWatcher::new(config.watcher_config(), Arc::clone(&processor));

        Ok(CollectorPipeline {
            config,
            state: PipelineState::Initialized,
            processor,
            watcher,
            loops_cancel: CancellationToken::new(),
            tasks: Vec::new(),
            fatal,
        })
    }
}
