//! 로그 쌍 감지기 -- 디렉토리의 생성 이벤트를 감시하여 `(txt, json)` 쌍을 넘깁니다.
//!
//! # 동작
//! 1. `<stem>.json` 생성 이벤트를 받으면 해당 stem의 대기를 시작합니다.
//!    같은 stem이 이미 대기 중이면 이벤트를 버립니다.
//! 2. 각 대기는 독립 태스크로 `<stem>.txt`의 존재를 `poll_interval` 간격으로 확인합니다.
//! 3. 제한 시간 안에 나타나면 [`PairHandler`]를 한 번 호출하고,
//!    나타나지 않으면 경고를 남기고 버립니다.
//! 4. 결과와 무관하게 대기 슬롯은 해제됩니다.
//!
//! `.txt` 생성만으로는 처리가 시작되지 않습니다. 메타데이터가 마지막에 쓰이므로
//! `.json` 생성이 작업 완료 신호입니다.
//!
//! # 아키텍처
//! ```text
//! notify watcher thread --(unbounded mpsc)--> event loop task --spawn--> wait task ... --spawn--> handler
//! ```

pub mod pending;

pub use pending::{PendingGuard, PendingSet};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use amtlog_core::metrics as m;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::CollectorError;

/// 메타데이터 확장자 (대기 시작 신호)
pub const METADATA_EXTENSION: &str = "json";

/// 텍스트 로그 확장자
pub const TEXT_EXTENSION: &str = "txt";

/// `stop()`이 진행 중인 대기를 기다리는 최대 시간
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// 짝이 맞춰진 로그 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    /// 파일명 stem
    pub stem: String,
    pub text_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// 짝이 맞춰진 파일을 처리하는 콜백
///
/// 반환된 에러와 패닉은 감지기가 기록만 하고 전파하지 않습니다.
pub trait PairHandler: Send + Sync + 'static {
    fn handle(&self, pair: FilePair) -> impl Future<Output = Result<(), CollectorError>> + Send;
}

/// 감지기 설정
#[derive(Debug, Clone)]
pub struct PairWatcherConfig {
    pub directory: PathBuf,
    /// `.txt`를 기다리는 최대 시간
    pub wait_timeout: Duration,
    /// `.txt` 존재 확인 간격
    pub poll_interval: Duration,
}

impl PairWatcherConfig {
    pub fn new(directory: impl Into<PathBuf>, wait_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            directory: directory.into(),
            wait_timeout,
            poll_interval,
        }
    }
}

/// 대기 태스크들이 공유하는 상태
struct Shared<H> {
    handler: Arc<H>,
    pending: PendingSet,
    tracker: TaskTracker,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl<H: PairHandler> Shared<H> {
    fn on_created(self: &Arc<Self>, path: &Path) {
        if path.extension().and_then(|e| e.to_str()) != Some(METADATA_EXTENSION) {
            return;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::debug!(path = %path.display(), "ignoring file without a UTF-8 stem");
            return;
        };

        let Some(guard) = self.pending.try_acquire(stem) else {
            metrics::counter!(m::DETECTOR_DUPLICATES_DROPPED_TOTAL).increment(1);
            tracing::info!(task_id = stem, "wait already pending, duplicate event dropped");
            return;
        };

        tracing::debug!(task_id = stem, path = %path.display(), "metadata created, waiting for text log");
        let shared = Arc::clone(self);
        let metadata_path = path.to_path_buf();
        self.tracker
            .spawn(async move { shared.wait_for_pair(guard, metadata_path).await });
    }

    async fn wait_for_pair(&self, guard: PendingGuard, metadata_path: PathBuf) {
        let text_path = metadata_path.with_extension(TEXT_EXTENSION);

        let appeared = tokio::time::timeout(self.wait_timeout, async {
            loop {
                if tokio::fs::try_exists(&text_path).await.unwrap_or(false) {
                    return;
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        })
        .await
        .is_ok();

        if !appeared {
            metrics::counter!(m::DETECTOR_PAIR_TIMEOUTS_TOTAL).increment(1);
            tracing::warn!(
                task_id = guard.task_id(),
                path = %text_path.display(),
                timeout_secs = self.wait_timeout.as_secs_f64(),
                "text log did not appear in time, task dropped"
            );
            return;
        }

        metrics::counter!(m::DETECTOR_PAIRS_DETECTED_TOTAL).increment(1);
        let pair = FilePair {
            stem: guard.task_id().to_owned(),
            text_path,
            metadata_path,
        };
        tracing::info!(task_id = %pair.stem, "log pair detected");

        let handler = Arc::clone(&self.handler);
        let task_id = pair.stem.clone();
        match tokio::spawn(async move { handler.handle(pair).await }).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(task_id = %task_id, error = %e, "pair handler failed"),
            Err(e) => tracing::error!(task_id = %task_id, error = %e, "pair handler aborted"),
        }
        drop(guard);
    }
}

/// 실행 중일 때만 존재하는 자원
struct Running {
    cancel: CancellationToken,
    watcher: RecommendedWatcher,
    event_loop: JoinHandle<()>,
}

/// 로그 쌍 감지기
pub struct PairWatcher<H> {
    config: PairWatcherConfig,
    shared: Arc<Shared<H>>,
    running: Option<Running>,
}

impl<H: PairHandler> PairWatcher<H> {
    pub fn new(config: PairWatcherConfig, handler: Arc<H>) -> Self {
        let shared = Arc::new(Shared {
            handler,
            pending: PendingSet::new(),
            tracker: TaskTracker::new(),
            wait_timeout: config.wait_timeout,
            poll_interval: config.poll_interval,
        });
        Self {
            config,
            shared,
            running: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// 감시를 시작합니다. 이미 실행 중이면 경고만 남깁니다.
    ///
    /// # Errors
    /// - 디렉토리가 없으면 [`CollectorError::NotFound`]
    /// - 디렉토리가 아니면 [`CollectorError::NotADirectory`]
    /// - 감시 등록 실패는 [`CollectorError::Watch`]
    pub async fn start(&mut self) -> Result<(), CollectorError> {
        if self.is_running() {
            tracing::warn!(directory = %self.config.directory.display(), "pair watcher already running");
            return Ok(());
        }

        let directory = &self.config.directory;
        let metadata = tokio::fs::metadata(directory).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CollectorError::NotFound {
                path: directory.display().to_string(),
            },
            _ => CollectorError::Io(e),
        })?;
        if !metadata.is_dir() {
            return Err(CollectorError::NotADirectory {
                path: directory.display().to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // 수신측이 닫혔으면 정지 중
            let _ = tx.send(res);
        })
        .map_err(|e| CollectorError::Watch(e.to_string()))?;
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| CollectorError::Watch(format!("{}: {e}", directory.display())))?;

        self.shared.tracker.reopen();
        let cancel = CancellationToken::new();
        let event_loop = tokio::spawn(event_loop(Arc::clone(&self.shared), rx, cancel.clone()));

        self.running = Some(Running {
            cancel,
            watcher,
            event_loop,
        });
        tracing::info!(
            directory = %directory.display(),
            wait_timeout_secs = self.config.wait_timeout.as_secs_f64(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "pair watcher started"
        );
        Ok(())
    }

    /// 감시를 멈추고 진행 중인 대기를 유예 시간 동안 기다립니다.
    /// 실행 중이 아니면 경고만 남깁니다.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            tracing::warn!("pair watcher is not running");
            return;
        };

        running.cancel.cancel();
        drop(running.watcher);
        if let Err(e) = running.event_loop.await {
            tracing::error!(error = %e, "pair watcher event loop aborted");
        }

        self.shared.tracker.close();
        let pending = self.shared.pending.len();
        if tokio::time::timeout(STOP_GRACE_PERIOD, self.shared.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                pending = self.shared.pending.len(),
                "pending waits still running after grace period"
            );
        }
        tracing::info!(pending_at_stop = pending, "pair watcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.cancel.is_cancelled() && !r.event_loop.is_finished())
    }

    /// 현재 대기 중인 태스크 수
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// 대기 슬롯 집합. 같은 태스크를 다른 경로로 처리하는 쪽도 이 슬롯을 점유해야 합니다.
    pub fn pending_set(&self) -> PendingSet {
        self.shared.pending.clone()
    }

    /// 생성 이벤트를 직접 주입합니다. 실행 중이 아니면 무시됩니다.
    pub fn on_created(&self, path: &Path) {
        if !self.is_running() {
            tracing::warn!(path = %path.display(), "pair watcher is not running, event ignored");
            return;
        }
        self.shared.on_created(path);
    }
}

async fn event_loop<H: PairHandler>(
    shared: Arc<Shared<H>>,
    mut rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => {
                let Some(result) = received else { break };
                match result {
                    Ok(event) if matches!(event.kind, EventKind::Create(_)) => {
                        for path in &event.paths {
                            shared.on_created(path);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "file watch error"),
                }
            }
        }
    }
    tracing::debug!("pair watcher event loop exited");
}
