//! 대기 중인 태스크 집합
//!
//! 같은 태스크에 대한 대기는 동시에 하나만 존재합니다.
//! 슬롯은 [`PendingGuard`]가 drop될 때 해제되므로 대기 태스크가 어떻게 끝나든 새지 않습니다.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use amtlog_core::metrics as m;

/// 대기 중인 태스크 ID 집합
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 슬롯을 점유합니다. 이미 대기 중이면 `None`
    pub fn try_acquire(&self, task_id: &str) -> Option<PendingGuard> {
        let len = {
            let mut set = self.lock();
            if !set.insert(task_id.to_owned()) {
                return None;
            }
            set.len()
        };
        metrics::gauge!(m::DETECTOR_PENDING_PAIRS).set(len as f64);

        Some(PendingGuard {
            set: self.clone(),
            task_id: task_id.to_owned(),
        })
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.lock().contains(task_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn release(&self, task_id: &str) {
        let len = {
            let mut set = self.lock();
            set.remove(task_id);
            set.len()
        };
        metrics::gauge!(m::DETECTOR_PENDING_PAIRS).set(len as f64);
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 점유한 대기 슬롯. drop 시 해제됩니다.
#[derive(Debug)]
pub struct PendingGuard {
    set: PendingSet,
    task_id: String,
}

impl PendingGuard {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.set.release(&self.task_id);
    }
}
