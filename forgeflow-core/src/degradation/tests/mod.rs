
use crate::degradation::{
    ActionError, ComponentHooks, DegradationParams, FallbackAction, FallbackActionKind,
    FallbackStrategy, FeatureProbe,
};
use crate::events::ControlPlaneEvent;
use crate::health::{ComponentHealth, ComponentPriority, ComponentStatus, SystemHealthMetrics};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;

pub(super) fn component(
    name: &str,
    status: ComponentStatus,
    priority: ComponentPriority,
) -> ComponentHealth {
    ComponentHealth {
        name: name.to_string(),
        status,
        score: status.baseline(),
        priority,
        weight: 1.0,
        response_time_ms: Some(5),
        error_rate: 0.0,
        issues: vec![],
        metrics: BTreeMap::new(),
        last_checked: Utc::now(),
    }
}

pub(super) fn snapshot(
    sequence: u64,
    overall_health: f64,
    components: Vec<ComponentHealth>,
) -> Arc<SystemHealthMetrics> {
    Arc::new(SystemHealthMetrics {
        sequence,
        timestamp: Utc::now(),
        overall_health,
        components: components
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect(),
        resources: BTreeMap::new(),
        integrity: None,
        active_alerts: vec![],
        degraded_reason: None,
    })
}

pub(super) fn strategy(
    component: &str,
    applicable: &[ComponentStatus],
    actions: Vec<FallbackAction>,
    reversible: bool,
) -> FallbackStrategy {
    FallbackStrategy {
        component: component.to_string(),
        name: format!("{component}_fallback"),
        applicable_states: applicable.to_vec(),
        actions,
        performance_impact: 0.3,
        functionality_lost: vec![format!("{component}_writes")],
        reversible,
    }
}

pub(super) fn params_with(strategies: Vec<FallbackStrategy>) -> DegradationParams {
    DegradationParams {
        strategies: strategies
            .into_iter()
            .map(|s| (s.component.clone(), s))
            .collect::<HashMap<_, _>>(),
        ..DegradationParams::default()
    }
}

pub(super) fn drain(rx: &mut broadcast::Receiver<ControlPlaneEvent>) -> Vec<ControlPlaneEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Records every hook call; can be told to fail one kind of action.
#[derive(Default)]
pub(super) struct RecordingHooks {
    pub(super) applied: Mutex<Vec<FallbackActionKind>>,
    pub(super) reverted: Mutex<Vec<FallbackActionKind>>,
    pub(super) restarts: Mutex<u32>,
    fail_apply: Option<FallbackActionKind>,
    fail_revert: bool,
}

impl RecordingHooks {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(super) fn failing_apply(kind: FallbackActionKind) -> Arc<Self> {
        Arc::new(Self {
            fail_apply: Some(kind),
            ..Self::default()
        })
    }

    pub(super) fn failing_revert() -> Arc<Self> {
        Arc::new(Self {
            fail_revert: true,
            ..Self::default()
        })
    }

    pub(super) fn applied(&self) -> Vec<FallbackActionKind> {
        self.applied.lock().clone()
    }

    pub(super) fn reverted(&self) -> Vec<FallbackActionKind> {
        self.reverted.lock().clone()
    }
}

#[async_trait]
impl ComponentHooks for RecordingHooks {
    async fn apply(&self, action: &FallbackAction) -> Result<(), ActionError> {
        if self.fail_apply == Some(action.kind) {
            return Err(ActionError::failed(action.kind, "backend refused"));
        }
        self.applied.lock().push(action.kind);
        Ok(())
    }

    async fn revert(&self, action: &FallbackAction) -> Result<(), ActionError> {
        if self.fail_revert {
            return Err(ActionError::failed(action.kind, "revert refused"));
        }
        self.reverted.lock().push(action.kind);
        Ok(())
    }

    async fn restart(&self) -> Result<(), ActionError> {
        *self.restarts.lock() += 1;
        Ok(())
    }
}

pub(super) struct FixedProbe(pub(super) bool);

#[async_trait]
impl FeatureProbe for FixedProbe {
    async fn available(&self) -> bool {
        self.0
    }
}
