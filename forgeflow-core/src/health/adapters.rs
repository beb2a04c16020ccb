use crate::circuit_breaker::{CircuitBreakerManager, CircuitState};
use crate::health::component::{
    CheckError, ComponentChecker, ComponentReport, ComponentStatus, IssueReport, IssueSeverity,
};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Aggregate health of every circuit breaker as one component.
///
/// All closed is healthy, any open is degraded, and half or more open is
/// critical. Each open breaker is reported as its own issue.
pub struct BreakerAggregateChecker {
    manager: Arc<CircuitBreakerManager>,
}

impl BreakerAggregateChecker {
    pub fn new(manager: Arc<CircuitBreakerManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ComponentChecker for BreakerAggregateChecker {
    async fn check(&self) -> Result<ComponentReport, CheckError> {
        let all = self.manager.all_metrics();
        let total = all.len();
        let open: Vec<&String> = all
            .iter()
            .filter(|(_, m)| m.state == CircuitState::Open)
            .map(|(name, _)| name)
            .collect();
        let half_open = all
            .iter()
            .filter(|(_, m)| m.state == CircuitState::HalfOpen)
            .count();

        let status = if open.is_empty() {
            ComponentStatus::Healthy
        } else if open.len() * 2 >= total {
            ComponentStatus::Critical
        } else {
            ComponentStatus::Degraded
        };

        let error_rate = if total == 0 {
            0.0
        } else {
            all.iter().map(|(_, m)| m.error_rate).sum::<f64>() / total as f64
        };

        let mut report = ComponentReport::with_status(status)
            .error_rate(error_rate)
            .metric("breakers", total as f64)
            .metric("open", open.len() as f64)
            .metric("half_open", half_open as f64);
        for name in open {
            report = report.issue(
                IssueReport::new(
                    IssueSeverity::High,
                    format!("circuit_open:{name}"),
                    format!("circuit breaker '{name}' is open"),
                )
                .auto_recoverable(),
            );
        }
        Ok(report)
    }
}

/// Wraps a plain `is_healthy()` style check.
pub struct LivenessChecker<F> {
    probe: F,
}

impl<F, Fut> LivenessChecker<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    pub fn new(probe: F) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl<F, Fut> ComponentChecker for LivenessChecker<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn check(&self) -> Result<ComponentReport, CheckError> {
        let started = Instant::now();
        let alive = (self.probe)().await;
        let elapsed = started.elapsed();

        if alive {
            Ok(ComponentReport::healthy().response_time(elapsed))
        } else {
            Ok(ComponentReport::with_status(ComponentStatus::Critical)
                .response_time(elapsed)
                .issue(IssueReport::new(
                    IssueSeverity::Critical,
                    "liveness",
                    "component reported itself unhealthy",
                )))
        }
    }
}

/// Read-only status snapshot of an agent pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatus {
    pub active_agents: u32,
    pub available_agents: u32,
    pub errored_agents: u32,
    pub active_worktrees: u32,
}

pub trait PoolStatusSource: Send + Sync {
    fn pool_status(&self) -> PoolStatus;
}

/// Exposes an agent pool's status snapshot as a monitored component.
pub struct PoolStatusChecker {
    source: Arc<dyn PoolStatusSource>,
}

impl PoolStatusChecker {
    pub fn new(source: Arc<dyn PoolStatusSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ComponentChecker for PoolStatusChecker {
    async fn check(&self) -> Result<ComponentReport, CheckError> {
        let s = self.source.pool_status();
        let total = s.active_agents + s.available_agents + s.errored_agents;

        let metrics = |r: ComponentReport| {
            r.metric("active_agents", s.active_agents as f64)
                .metric("available_agents", s.available_agents as f64)
                .metric("errored_agents", s.errored_agents as f64)
                .metric("active_worktrees", s.active_worktrees as f64)
        };

        if total == 0 {
            return Ok(metrics(
                ComponentReport::with_status(ComponentStatus::Offline).issue(IssueReport::new(
                    IssueSeverity::Critical,
                    "no_agents",
                    "agent pool has no agents",
                )),
            ));
        }

        let error_ratio = s.errored_agents as f64 / total as f64;
        let mut report = ComponentReport::healthy().error_rate(error_ratio);

        if s.errored_agents > 0 {
            let (status, severity) = if error_ratio >= 0.5 {
                (ComponentStatus::Critical, IssueSeverity::Critical)
            } else if error_ratio >= 0.25 {
                (ComponentStatus::Degraded, IssueSeverity::High)
            } else {
                (ComponentStatus::Degraded, IssueSeverity::Medium)
            };
            report.status = status;
            report = report.issue(IssueReport::new(
                severity,
                "agent_errors",
                format!("{} of {} agents in error state", s.errored_agents, total),
            ));
        }

        if s.available_agents == 0 && s.active_agents > 0 {
            if report.status == ComponentStatus::Healthy {
                report.status = ComponentStatus::Degraded;
            }
            report = report.issue(
                IssueReport::new(IssueSeverity::Medium, "pool_saturated", "no idle agents available")
                    .auto_recoverable(),
            );
        }

        Ok(metrics(report))
    }
}
