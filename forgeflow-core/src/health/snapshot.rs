use crate::health::alerts::SystemAlert;
use crate::health::component::{ComponentHealth, ComponentPriority, ComponentStatus};
use crate::health::resources::ResourceMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("non-finite {block} score")]
    NonFiniteScore { block: &'static str },

    #[error("health monitor is shutting down")]
    ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegritySummary {
    /// 0-100.
    pub score: f64,
    pub checks_passed: u32,
    pub checks_failed: u32,
    pub details: Vec<String>,
}

/// Optional data-integrity check folded into the overall score.
#[async_trait]
pub trait IntegrityChecker: Send + Sync {
    async fn check(&self) -> IntegritySummary;
}

/// One immutable health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealthMetrics {
    /// Monotonic per monitor, starting at 1.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub overall_health: f64,
    pub components: BTreeMap<String, ComponentHealth>,
    pub resources: ResourceMetrics,
    pub integrity: Option<IntegritySummary>,
    pub active_alerts: Vec<SystemAlert>,
    /// Set when aggregation failed and `overall_health` was forced low.
    pub degraded_reason: Option<String>,
}

impl SystemHealthMetrics {
    /// Components counted as failed (critical or offline).
    pub fn failed_components(&self) -> Vec<&ComponentHealth> {
        self.components
            .values()
            .filter(|c| c.status.is_failed())
            .collect()
    }

    pub fn degraded_components(&self) -> Vec<&ComponentHealth> {
        self.components
            .values()
            .filter(|c| c.status == ComponentStatus::Degraded)
            .collect()
    }

    pub fn failed_with_priority(&self, priority: ComponentPriority) -> usize {
        self.components
            .values()
            .filter(|c| c.priority == priority && c.status.is_failed())
            .count()
    }

    pub fn status_of(&self, component: &str) -> Option<ComponentStatus> {
        self.components.get(component).map(|c| c.status)
    }
}
