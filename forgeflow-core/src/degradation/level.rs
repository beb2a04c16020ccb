use crate::degradation::error::DegradationError;
use crate::health::{ComponentPriority, SystemHealthMetrics};
use serde::Serialize;
use std::time::Duration;

/// Level-wide mitigation executed on entering a level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LevelAction {
    ActivateFallback { component: String },
    IsolateComponent { component: String },
    ShedCapacity { percent: u8 },
    DisableFeature { feature: String },
    EnterEmergencyMode,
    RestartComponent { component: String },
}

/// Failed components tolerated per priority class before escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureBudget {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl FailureBudget {
    pub const UNLIMITED: FailureBudget = FailureBudget {
        critical: u32::MAX,
        high: u32::MAX,
        medium: u32::MAX,
        low: u32::MAX,
    };

    pub fn new(critical: u32, high: u32, medium: u32, low: u32) -> Self {
        Self {
            critical,
            high,
            medium,
            low,
        }
    }

    pub fn exceeded_by(&self, failed: &FailureCounts) -> bool {
        failed.critical > self.critical
            || failed.high > self.high
            || failed.medium > self.medium
            || failed.low > self.low
    }
}

/// Failed components per priority class in one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl FailureCounts {
    pub fn of(snapshot: &SystemHealthMetrics) -> Self {
        let count = |p| snapshot.failed_with_priority(p) as u32;
        Self {
            critical: count(ComponentPriority::Critical),
            high: count(ComponentPriority::High),
            medium: count(ComponentPriority::Medium),
            low: count(ComponentPriority::Low),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationLevel {
    pub id: u8,
    pub name: String,
    pub min_health: f64,
    pub max_health: f64,
    /// Longest stay before forced escalation; `None` never escalates.
    pub max_duration: Option<Duration>,
    pub notification: Option<String>,
    pub failure_budget: FailureBudget,
    pub actions: Vec<LevelAction>,
}

/// Lowest level a failed critical-priority component forces.
pub const CRITICAL_COMPONENT_FLOOR: u8 = 3;
/// Lowest level more than one failed high-priority component forces.
pub const HIGH_COMPONENTS_FLOOR: u8 = 2;

/// Ordered, validated degradation levels. Level 0 is optimal.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTable {
    levels: Vec<DegradationLevel>,
}

impl LevelTable {
    pub fn new(mut levels: Vec<DegradationLevel>) -> Result<Self, DegradationError> {
        let invalid = |reason: String| Err(DegradationError::InvalidLevels { reason });

        if levels.is_empty() {
            return invalid("at least one level is required".into());
        }
        levels.sort_by_key(|l| l.id);

        for (i, level) in levels.iter().enumerate() {
            if level.id as usize != i {
                return invalid(format!("level ids must be contiguous from 0; missing {i}"));
            }
            if !(0.0..=100.0).contains(&level.min_health)
                || !(0.0..=100.0).contains(&level.max_health)
                || level.min_health > level.max_health
            {
                return invalid(format!(
                    "level {} has an invalid health range {}-{}",
                    level.id, level.min_health, level.max_health
                ));
            }
        }

        for pair in levels.windows(2) {
            let (better, worse) = (&pair[0], &pair[1]);
            if worse.max_health >= better.min_health {
                return invalid(format!(
                    "levels {} and {} have overlapping or inverted health ranges",
                    better.id, worse.id
                ));
            }
        }

        Ok(Self { levels })
    }

    pub fn max_level(&self) -> u8 {
        (self.levels.len() - 1) as u8
    }

    pub fn get(&self, id: u8) -> Option<&DegradationLevel> {
        self.levels.get(id as usize)
    }

    pub fn levels(&self) -> &[DegradationLevel] {
        &self.levels
    }

    pub fn name_of(&self, id: u8) -> &str {
        self.get(id).map(|l| l.name.as_str()).unwrap_or("unknown")
    }

    /// The level with the greatest `min_health` not above `health`.
    /// Health below every range maps to the worst level.
    pub fn level_for_health(&self, health: f64) -> u8 {
        self.levels
            .iter()
            .find(|l| health >= l.min_health)
            .map(|l| l.id)
            .unwrap_or_else(|| self.max_level())
    }

    /// Applies priority escalation and failure budgets on top of a
    /// health-derived level.
    pub fn escalate(&self, candidate: u8, failed: &FailureCounts) -> u8 {
        let max = self.max_level();
        let mut level = candidate;

        if failed.critical > 0 {
            level = level.max(CRITICAL_COMPONENT_FLOOR.min(max));
        }
        if failed.high > 1 {
            level = level.max(HIGH_COMPONENTS_FLOOR.min(max));
        }

        while level < max
            && self
                .get(level)
                .map(|l| l.failure_budget.exceeded_by(failed))
                .unwrap_or(false)
        {
            level += 1;
        }
        level
    }

    /// Capacity a level demands, in percent of normal.
    pub fn capacity_for(&self, id: u8) -> u8 {
        let shed = self
            .get(id)
            .map(|l| {
                l.actions
                    .iter()
                    .filter_map(|a| match a {
                        LevelAction::ShedCapacity { percent } => Some(*percent),
                        _ => None,
                    })
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        100u8.saturating_sub(shed.min(100))
    }

    pub fn demands(&self, id: u8, wanted: impl Fn(&LevelAction) -> bool) -> bool {
        self.get(id)
            .map(|l| l.actions.iter().any(wanted))
            .unwrap_or(false)
    }

    pub fn default_levels() -> Vec<DegradationLevel> {
        let minutes = |m: u64| Some(Duration::from_secs(m * 60));
        vec![
            DegradationLevel {
                id: 0,
                name: "optimal".into(),
                min_health: 90.0,
                max_health: 100.0,
                max_duration: None,
                notification: None,
                failure_budget: FailureBudget::new(0, 0, 1, 2),
                actions: vec![],
            },
            DegradationLevel {
                id: 1,
                name: "minor".into(),
                min_health: 70.0,
                max_health: 89.0,
                max_duration: minutes(30),
                notification: None,
                failure_budget: FailureBudget::new(0, 1, 2, 4),
                actions: vec![],
            },
            DegradationLevel {
                id: 2,
                name: "degraded".into(),
                min_health: 50.0,
                max_health: 69.0,
                max_duration: minutes(15),
                notification: Some("System operating in degraded mode".into()),
                failure_budget: FailureBudget::new(0, 2, 4, 8),
                actions: vec![LevelAction::ShedCapacity { percent: 25 }],
            },
            DegradationLevel {
                id: 3,
                name: "critical".into(),
                min_health: 30.0,
                max_health: 49.0,
                max_duration: minutes(10),
                notification: Some("System running with limited functionality".into()),
                failure_budget: FailureBudget::new(1, 4, 8, 16),
                actions: vec![
                    LevelAction::ShedCapacity { percent: 50 },
                    LevelAction::DisableFeature {
                        feature: "non_essential".into(),
                    },
                ],
            },
            DegradationLevel {
                id: 4,
                name: "emergency".into(),
                min_health: 0.0,
                max_health: 29.0,
                max_duration: None,
                notification: Some("Emergency mode: only core functionality is available".into()),
                failure_budget: FailureBudget::UNLIMITED,
                actions: vec![LevelAction::EnterEmergencyMode],
            },
        ]
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            levels: Self::default_levels(),
        }
    }
}
