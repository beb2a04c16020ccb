//! System health monitoring.
//!
//! Every tick checks all registered components concurrently, samples
//! resources, scores both into one 0-100 figure and raises or retires
//! alerts. Snapshots are immutable and handed out as `Arc`s.

mod adapters;
mod alerts;
mod component;
mod issues;
mod monitor;
mod resources;
mod scoring;
mod snapshot;

#[cfg(test)]
mod tests;

pub use adapters::{
    BreakerAggregateChecker, LivenessChecker, PoolStatus, PoolStatusChecker, PoolStatusSource,
};
pub use alerts::{AlertChannel, AlertManager, AlertParams, AlertSeverity, RATE_WINDOW, RaiseOutcome, SystemAlert};
pub use component::{
    CheckError, ComponentChecker, ComponentHealth, ComponentPriority, ComponentReport,
    ComponentSettings, ComponentStatus, HealthIssue, IssueReport, IssueSeverity,
};
pub use issues::IssueTracker;
pub use monitor::{HealthMonitorParams, SHUTDOWN_GRACE, SystemHealthMonitor};
pub use resources::{
    ProcResourceSampler, ResourceKind, ResourceMetric, ResourceMetrics, ResourceSample,
    ResourceSampler, ResourceStatus, ResourceThresholds, ResourceTracker, Trend, UsageReading,
};
pub use scoring::{
    COMPONENT_BLOCK_WEIGHT, INTEGRITY_BLOCK_WEIGHT, RESOURCE_BLOCK_WEIGHT, component_score,
    overall_health, resource_score, weighted_component_score,
};
pub use snapshot::{IntegrityChecker, IntegritySummary, MonitorError, SystemHealthMetrics};
