use crate::health::ComponentStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackActionKind {
    Redirect,
    Cache,
    Mock,
    Disable,
    Isolate,
    BackupService,
    ReducedFunctionality,
}

impl fmt::Display for FallbackActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FallbackActionKind::Redirect => "redirect",
            FallbackActionKind::Cache => "cache",
            FallbackActionKind::Mock => "mock",
            FallbackActionKind::Disable => "disable",
            FallbackActionKind::Isolate => "isolate",
            FallbackActionKind::BackupService => "backup_service",
            FallbackActionKind::ReducedFunctionality => "reduced_functionality",
        };
        f.write_str(s)
    }
}

impl FromStr for FallbackActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "redirect" => Ok(FallbackActionKind::Redirect),
            "cache" => Ok(FallbackActionKind::Cache),
            "mock" => Ok(FallbackActionKind::Mock),
            "disable" => Ok(FallbackActionKind::Disable),
            "isolate" => Ok(FallbackActionKind::Isolate),
            "backup_service" => Ok(FallbackActionKind::BackupService),
            "reduced_functionality" => Ok(FallbackActionKind::ReducedFunctionality),
            other => Err(format!("unknown fallback action type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackAction {
    pub kind: FallbackActionKind,
    pub target: Option<String>,
    /// A failing critical action aborts and rolls back the whole activation.
    pub critical: bool,
    pub settings: BTreeMap<String, String>,
}

impl FallbackAction {
    pub fn new(kind: FallbackActionKind) -> Self {
        Self {
            kind,
            target: None,
            critical: false,
            settings: BTreeMap::new(),
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Per-component mitigation plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackStrategy {
    pub component: String,
    pub name: String,
    pub applicable_states: Vec<ComponentStatus>,
    pub actions: Vec<FallbackAction>,
    /// Expected throughput loss, 0.0-1.0.
    pub performance_impact: f64,
    pub functionality_lost: Vec<String>,
    pub reversible: bool,
}

impl FallbackStrategy {
    pub fn applies_to(&self, status: ComponentStatus) -> bool {
        self.applicable_states.contains(&status)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Activating,
    Active,
    Reverting,
    Reverted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveStrategy {
    pub component: String,
    pub strategy: String,
    pub activated_at: DateTime<Utc>,
    pub executed_actions: Vec<FallbackAction>,
    pub reversible: bool,
    pub status: StrategyStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{action} failed: {reason}")]
    Failed { action: String, reason: String },

    #[error("{action} is not supported by this component")]
    Unsupported { action: String },
}

impl ActionError {
    pub fn failed(action: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::Failed {
            action: action.to_string(),
            reason: reason.into(),
        }
    }
}

/// Hooks a component exposes so mitigations can act on it.
#[async_trait]
pub trait ComponentHooks: Send + Sync {
    async fn apply(&self, action: &FallbackAction) -> Result<(), ActionError>;

    async fn revert(&self, action: &FallbackAction) -> Result<(), ActionError>;

    async fn restart(&self) -> Result<(), ActionError> {
        Err(ActionError::Unsupported {
            action: "restart".into(),
        })
    }
}

/// Re-test for a feature disabled by a degradation level.
#[async_trait]
pub trait FeatureProbe: Send + Sync {
    async fn available(&self) -> bool;
}
