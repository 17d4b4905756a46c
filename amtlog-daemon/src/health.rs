//! Aggregated health reporting.
//!
//! The daemon status is the worst status among its components.
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reasons)
//! - Any Unhealthy -> Unhealthy(reasons)

use serde::{Serialize, Serializer};

use amtlog_collector::LedgerStats;
use amtlog_core::pipeline::HealthStatus;

/// Health report for the whole daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Worst status among all components.
    #[serde(serialize_with = "status_string")]
    pub status: HealthStatus,
    pub uptime_secs: u64,
    /// Tasks currently waiting for their text log.
    pub pending_pairs: usize,
    /// Ledger counts, absent when the ledger could not be queried.
    pub ledger: Option<LedgerStats>,
    pub components: Vec<ComponentHealth>,
}

/// Health status for a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g., "collector", "ledger").
    pub name: String,
    #[serde(serialize_with = "status_string")]
    pub status: HealthStatus,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Reduce the delivery backlog to a component status.
///
/// Records that exhausted their retries will never be delivered without
/// operator action, which degrades the daemon without stopping it.
pub fn backlog_status(stats: &LedgerStats) -> HealthStatus {
    if stats.exhausted > 0 {
        HealthStatus::Degraded(format!(
            "{} record(s) exhausted delivery retries",
            stats.exhausted
        ))
    } else {
        HealthStatus::Healthy
    }
}

/// Return the worst status found: Unhealthy > Degraded > Healthy.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let reasons = |pick: fn(&HealthStatus) -> Option<&String>| {
        components
            .iter()
            .filter_map(|c| pick(&c.status).map(|reason| format!("{}: {reason}", c.name)))
            .collect::<Vec<_>>()
    };

    let unhealthy = reasons(|s| match s {
        HealthStatus::Unhealthy(r) => Some(r),
        _ => None,
    });
    if !unhealthy.is_empty() {
        return HealthStatus::Unhealthy(unhealthy.join("; "));
    }

    let degraded = reasons(|s| match s {
        HealthStatus::Degraded(r) => Some(r),
        _ => None,
    });
    if !degraded.is_empty() {
        return HealthStatus::Degraded(degraded.join("; "));
    }
    HealthStatus::Healthy
}

fn status_string<S: Serializer>(status: &HealthStatus, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(status)
}
