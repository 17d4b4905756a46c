//! Collector orchestration -- assembly, lifecycle and the main loop.
//!
//! The [`Orchestrator`] owns the [`CollectorPipeline`], the PID file and the
//! fatal cancellation token shared with the collector.
//!
//! # Shutdown triggers
//!
//! - `SIGTERM` / `SIGINT`
//! - the fatal token, cancelled by the collector when the ledger fails
//!   (deliveries can no longer be recorded, so the daemon exits non-zero)

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use amtlog_collector::{CollectorConfig, CollectorPipeline, CollectorPipelineBuilder};
use amtlog_core::config::AmtlogConfig;
use amtlog_core::metrics as m;
use amtlog_core::pipeline::{HealthStatus, Pipeline};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status, backlog_status};
use crate::metrics_server;
use crate::pid_file::{remove_pid_file, write_pid_file};

/// Interval of the health/uptime tick in the main loop.
const HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Why the main loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Operator-requested shutdown (named signal).
    Signal(&'static str),
    /// The collector tripped the fatal token.
    Fatal,
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: AmtlogConfig,
    pipeline: CollectorPipeline,
    fatal: CancellationToken,
    start_time: Instant,
}

impl Orchestrator {
    /// Load `amtlog.toml` (with env overrides and validation) and build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = AmtlogConfig::load(config_path)
            .await
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the metrics recorder when enabled, then compiles rules,
    /// creates the sinks and opens the ledger.
    pub async fn build_from_config(config: AmtlogConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let fatal = CancellationToken::new();
        let pipeline = CollectorPipelineBuilder::new()
            .config(CollectorConfig::from_core(&config))
            .fatal_token(fatal.clone())
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to build collector: {e}"))?;

        metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
        tracing::info!(
            directory = %config.watcher.log_directory,
            rules = pipeline.rule_count(),
            vector = config.vector.enabled,
            syslog = config.syslog.enabled,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            fatal,
            start_time: Instant::now(),
        })
    }

    /// Run until SIGTERM/SIGINT or a fatal collector error.
    pub async fn run(&mut self) -> Result<ExitReason> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the collector and run until `shutdown` resolves or the fatal
    /// token is cancelled.
    ///
    /// # Errors
    ///
    /// - PID file cannot be written
    /// - the collector fails to start
    /// - the collector tripped the fatal token (after a clean stop)
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<ExitReason>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_file = self.pid_file();
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        if let Err(e) = self.pipeline.start().await {
            tracing::error!(error = %e, "collector failed to start");
            if let Some(path) = &pid_file {
                remove_pid_file(path);
            }
            return Err(anyhow::anyhow!("failed to start collector: {e}"));
        }

        let reason = self.main_loop(shutdown).await;

        if let Err(e) = self.pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop collector");
        }
        self.pipeline.ledger().close().await;
        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }

        match reason? {
            ExitReason::Fatal => Err(anyhow::anyhow!(
                "collector stopped after a fatal ledger error"
            )),
            reason => Ok(reason),
        }
    }

    async fn main_loop<F>(&self, shutdown: F) -> Result<ExitReason>
    where
        F: Future<Output = Result<&'static str>>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!("amtlog-daemon running");
        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    let signal = signal?;
                    tracing::info!(signal, "shutdown signal received");
                    return Ok(ExitReason::Signal(signal));
                }
                () = self.fatal.cancelled() => {
                    tracing::error!("fatal collector error, shutting down");
                    return Ok(ExitReason::Fatal);
                }
                _ = ticker.tick() => {
                    let health = self.health().await;
                    match &health.status {
                        HealthStatus::Healthy => tracing::debug!(uptime_secs = health.uptime_secs, "health check"),
                        status => tracing::warn!(
                            status = %status,
                            pending_pairs = health.pending_pairs,
                            "daemon not healthy"
                        ),
                    }
                }
            }
        }
    }

    /// Current aggregated health. Also refreshes the uptime gauge.
    pub async fn health(&self) -> DaemonHealth {
        let mut components = vec![ComponentHealth::new(
            "collector",
            self.pipeline.health_check().await,
        )];

        let ledger = match self.pipeline.ledger().stats(self.config.vector.retry_max).await {
            Ok(stats) => {
                components.push(ComponentHealth::new("ledger", backlog_status(&stats)));
                Some(stats)
            }
            Err(e) => {
                components.push(ComponentHealth::new(
                    "ledger",
                    HealthStatus::Unhealthy(e.to_string()),
                ));
                None
            }
        };

        let uptime_secs = self.start_time.elapsed().as_secs();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs,
            pending_pairs: self.pipeline.pending_count(),
            ledger,
            components,
        }
    }

    pub fn config(&self) -> &AmtlogConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &CollectorPipeline {
        &self.pipeline
    }

    /// Token cancelled on fatal collector errors.
    pub fn fatal_token(&self) -> &CancellationToken {
        &self.fatal
    }

    fn pid_file(&self) -> Option<PathBuf> {
        let path = &self.config.general.pid_file;
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
