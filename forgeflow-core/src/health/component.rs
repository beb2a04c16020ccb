use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Healthy,
    #[serde(alias = "warning")]
    Degraded,
    Critical,
    Offline,
}

impl ComponentStatus {
    /// Score a component starts from before penalties.
    pub fn baseline(self) -> f64 {
        match self {
            ComponentStatus::Healthy => 100.0,
            ComponentStatus::Degraded => 70.0,
            ComponentStatus::Critical => 30.0,
            ComponentStatus::Offline => 0.0,
        }
    }

    /// Critical and offline components count as failed for degradation purposes.
    pub fn is_failed(self) -> bool {
        matches!(self, ComponentStatus::Critical | ComponentStatus::Offline)
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Critical => "critical",
            ComponentStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

impl FromStr for ComponentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "healthy" => Ok(ComponentStatus::Healthy),
            "degraded" | "warning" => Ok(ComponentStatus::Degraded),
            "critical" => Ok(ComponentStatus::Critical),
            "offline" => Ok(ComponentStatus::Offline),
            other => Err(format!("unknown component status '{other}'")),
        }
    }
}

/// Priority class used for failure budgets and escalation.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl FromStr for ComponentPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(ComponentPriority::Critical),
            "high" => Ok(ComponentPriority::High),
            "medium" => Ok(ComponentPriority::Medium),
            "low" => Ok(ComponentPriority::Low),
            other => Err(format!("unknown component priority '{other}'")),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// An issue as reported by a checker for the current tick.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueReport {
    pub severity: IssueSeverity,
    pub category: String,
    pub description: String,
    pub auto_recoverable: bool,
}

impl IssueReport {
    pub fn new(severity: IssueSeverity, category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            description: description.into(),
            auto_recoverable: false,
        }
    }

    pub fn auto_recoverable(mut self) -> Self {
        self.auto_recoverable = true;
        self
    }
}

/// What a component checker returns for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentReport {
    pub status: ComponentStatus,
    pub response_time: Option<Duration>,
    pub error_rate: f64,
    pub issues: Vec<IssueReport>,
    pub metrics: BTreeMap<String, f64>,
}

impl ComponentReport {
    pub fn with_status(status: ComponentStatus) -> Self {
        Self {
            status,
            response_time: None,
            error_rate: 0.0,
            issues: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy)
    }

    pub fn response_time(mut self, rt: Duration) -> Self {
        self.response_time = Some(rt);
        self
    }

    pub fn error_rate(mut self, rate: f64) -> Self {
        self.error_rate = rate;
        self
    }

    pub fn issue(mut self, issue: IssueReport) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("health check failed: {reason}")]
    Failed { reason: String },

    #[error("health check timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("health check panicked")]
    Panicked,

    #[error("component unreachable: {reason}")]
    Unreachable { reason: String },
}

impl CheckError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Issue category recorded when a check fails this way.
    pub fn category(&self) -> &'static str {
        match self {
            CheckError::Failed { .. } => "check_failed",
            CheckError::TimedOut { .. } => "check_timeout",
            CheckError::Panicked => "check_panicked",
            CheckError::Unreachable { .. } => "unreachable",
        }
    }
}

/// Health check contract implemented by every monitored component.
#[async_trait]
pub trait ComponentChecker: Send + Sync {
    async fn check(&self) -> Result<ComponentReport, CheckError>;
}

/// Per-component scoring settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentSettings {
    pub weight: f64,
    pub priority: ComponentPriority,
}

impl Default for ComponentSettings {
    fn default() -> Self {
        Self {
            weight: 1.0,
            priority: ComponentPriority::Medium,
        }
    }
}

/// A tracked issue, open or resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIssue {
    pub id: String,
    pub component: String,
    pub severity: IssueSeverity,
    pub category: String,
    pub description: String,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub occurrence_count: u32,
    pub auto_recoverable: bool,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: ComponentStatus,
    pub score: f64,
    pub priority: ComponentPriority,
    pub weight: f64,
    pub response_time_ms: Option<u64>,
    pub error_rate: f64,
    pub issues: Vec<HealthIssue>,
    pub metrics: BTreeMap<String, f64>,
    pub last_checked: DateTime<Utc>,
}
