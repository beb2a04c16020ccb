use crate::circuit_breaker::{CircuitBreakerManager, CircuitState};
use crate::events::EventBus;
use crate::health::{
    BreakerAggregateChecker, ComponentChecker, ComponentStatus, LivenessChecker, PoolStatus,
    PoolStatusChecker, PoolStatusSource,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

struct FixedPool(PoolStatus);

impl PoolStatusSource for FixedPool {
    fn pool_status(&self) -> PoolStatus {
        self.0
    }
}

fn breakers(open: &[&str], closed: &[&str]) -> Arc<CircuitBreakerManager> {
    let m = Arc::new(CircuitBreakerManager::with_defaults(EventBus::default()));
    for name in open {
        m.force_state(name, CircuitState::Open, "test");
    }
    for name in closed {
        m.force_state(name, CircuitState::Closed, "test");
    }
    m
}

#[tokio::test]
async fn all_closed_breakers_are_healthy() {
    let checker = BreakerAggregateChecker::new(breakers(&[], &["search", "tracker"]));

    let report = checker.check().await.unwrap();

    assert_eq!(report.status, ComponentStatus::Healthy);
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn a_minority_of_open_breakers_is_degraded() {
    let checker = BreakerAggregateChecker::new(breakers(&["search"], &["tracker", "agents"]));

    let report = checker.check().await.unwrap();

    assert_eq!(report.status, ComponentStatus::Degraded);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].category, "circuit_open:search");
    assert_eq!(report.metrics["open"], 1.0);
}

#[tokio::test]
async fn half_or_more_open_is_critical() {
    let checker = BreakerAggregateChecker::new(breakers(&["search", "tracker"], &["agents"]));

    let report = checker.check().await.unwrap();

    assert_eq!(report.status, ComponentStatus::Critical);
    assert_eq!(report.issues.len(), 2);
}

#[tokio::test]
async fn liveness_maps_bool_to_status() {
    let alive = LivenessChecker::new(|| async { true });
    let dead = LivenessChecker::new(|| async { false });

    let up = alive.check().await.unwrap();
    let down = dead.check().await.unwrap();

    assert_eq!(up.status, ComponentStatus::Healthy);
    assert_eq!(down.status, ComponentStatus::Critical);
    assert_eq!(down.issues[0].category, "liveness");
}

#[tokio::test]
async fn pool_status_reflects_errored_agents() {
    let cases = [
        (
            PoolStatus {
                active_agents: 4,
                available_agents: 6,
                errored_agents: 0,
                active_worktrees: 4,
            },
            ComponentStatus::Healthy,
        ),
        (
            PoolStatus {
                active_agents: 4,
                available_agents: 5,
                errored_agents: 1,
                active_worktrees: 4,
            },
            ComponentStatus::Degraded,
        ),
        (
            PoolStatus {
                active_agents: 2,
                available_agents: 2,
                errored_agents: 6,
                active_worktrees: 2,
            },
            ComponentStatus::Critical,
        ),
        (PoolStatus::default(), ComponentStatus::Offline),
    ];

    for (status, expected) in cases {
        let checker = PoolStatusChecker::new(Arc::new(FixedPool(status)));

        let report = checker.check().await.unwrap();

        assert_eq!(report.status, expected, "pool {status:?}");
    }
}

#[tokio::test]
async fn saturated_pool_is_degraded() {
    let checker = PoolStatusChecker::new(Arc::new(FixedPool(PoolStatus {
        active_agents: 8,
        available_agents: 0,
        errored_agents: 0,
        active_worktrees: 8,
    })));

    let report = checker.check().await.unwrap();

    assert_eq!(report.status, ComponentStatus::Degraded);
    assert_eq!(report.issues[0].category, "pool_saturated");
    assert_eq!(report.metrics["active_worktrees"], 8.0);
}
