//! Health aggregation tests.

use amtlog_collector::LedgerStats;
use amtlog_core::pipeline::HealthStatus;
use amtlog_daemon::health::{ComponentHealth, aggregate_status, backlog_status};

#[test]
fn test_aggregate_status_all_healthy() {
    let components = vec![
        ComponentHealth::new("collector", HealthStatus::Healthy),
        ComponentHealth::new("ledger", HealthStatus::Healthy),
    ];
    assert!(aggregate_status(&components).is_healthy());
}

#[test]
fn test_aggregate_status_empty_is_healthy() {
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_aggregate_status_degraded_collects_reasons() {
    let components = vec![
        ComponentHealth::new("collector", HealthStatus::Degraded("watcher stopped".to_owned())),
        ComponentHealth::new("ledger", HealthStatus::Degraded("2 record(s) exhausted".to_owned())),
    ];
    assert_eq!(
        aggregate_status(&components),
        HealthStatus::Degraded("collector: watcher stopped; ledger: 2 record(s) exhausted".to_owned())
    );
}

#[test]
fn test_aggregate_status_unhealthy_wins() {
    let components = vec![
        ComponentHealth::new("collector", HealthStatus::Degraded("watcher stopped".to_owned())),
        ComponentHealth::new("ledger", HealthStatus::Unhealthy("pool closed".to_owned())),
    ];
    assert_eq!(
        aggregate_status(&components),
        HealthStatus::Unhealthy("ledger: pool closed".to_owned())
    );
}

#[test]
fn test_backlog_status() {
    let clean = LedgerStats {
        total: 10,
        delivered: 8,
        pending: 2,
        exhausted: 0,
    };
    assert!(backlog_status(&clean).is_healthy());

    let stuck = LedgerStats {
        exhausted: 1,
        ..clean
    };
    assert_eq!(
        backlog_status(&stuck),
        HealthStatus::Degraded("1 record(s) exhausted delivery retries".to_owned())
    );
}
