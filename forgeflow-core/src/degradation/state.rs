use crate::degradation::strategy::ActiveStrategy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Read-only view of the degradation runtime state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationState {
    pub level: u8,
    pub level_name: String,
    pub active_strategies: Vec<ActiveStrategy>,
    /// Failed per the latest snapshot, plus isolated components.
    pub failed_components: BTreeSet<String>,
    pub degraded_components: BTreeSet<String>,
    pub isolated_components: BTreeSet<String>,
    pub disabled_features: BTreeSet<String>,
    /// Functionality given up by active strategies.
    pub lost_functionality: BTreeSet<String>,
    pub capacity_percent: u8,
    pub emergency_mode: bool,
    pub auto_recovery_attempts: u32,
    pub last_state_change: DateTime<Utc>,
    pub last_health: Option<f64>,
    pub last_sequence: u64,
}

impl DegradationState {
    pub fn initial(level_name: &str) -> Self {
        Self {
            level: 0,
            level_name: level_name.to_string(),
            active_strategies: Vec::new(),
            failed_components: BTreeSet::new(),
            degraded_components: BTreeSet::new(),
            isolated_components: BTreeSet::new(),
            disabled_features: BTreeSet::new(),
            lost_functionality: BTreeSet::new(),
            capacity_percent: 100,
            emergency_mode: false,
            auto_recovery_attempts: 0,
            last_state_change: Utc::now(),
            last_health: None,
            last_sequence: 0,
        }
    }

    pub fn active_strategy(&self, component: &str) -> Option<&ActiveStrategy> {
        self.active_strategies
            .iter()
            .find(|s| s.component == component)
    }

    pub(crate) fn recompute_lost_functionality(
        &mut self,
        lost_by: impl Fn(&str) -> Vec<String>,
    ) {
        self.lost_functionality = self
            .active_strategies
            .iter()
            .flat_map(|s| lost_by(&s.component))
            .collect();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationEvent {
    pub at: DateTime<Utc>,
    pub from: u8,
    pub to: u8,
    pub reason: String,
    pub health: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedActivation {
    pub at: DateTime<Utc>,
    pub component: String,
    pub strategy: String,
    pub error: String,
}
