use crate::circuit_breaker::{CircuitBreakerManager, CircuitState};
use crate::degradation::error::DegradationError;
use crate::degradation::level::{FailureCounts, LevelAction, LevelTable};
use crate::degradation::state::{DegradationEvent, DegradationState, FailedActivation};
use crate::degradation::strategy::{
    ActionError, ActiveStrategy, ComponentHooks, FallbackAction, FallbackActionKind,
    FallbackStrategy, FeatureProbe, StrategyStatus,
};
use crate::events::{ControlPlaneEvent, EventBus};
use crate::health::{ComponentStatus, SystemHealthMetrics};
use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on waiting for an in-flight evaluation during shutdown.
pub const EVALUATION_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DegradationParams {
    /// Interval of the dwell-time check.
    pub evaluation_interval: Duration,
    pub auto_recovery: bool,
    /// Activate strategies for failed or degraded components while level > 0.
    pub auto_activate_strategies: bool,
    pub history_size: usize,
    pub emergency_trigger_health: f64,
    pub core_components: BTreeSet<String>,
    pub levels: LevelTable,
    /// Keyed by component name.
    pub strategies: HashMap<String, FallbackStrategy>,
}

impl Default for DegradationParams {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(10),
            auto_recovery: true,
            auto_activate_strategies: true,
            history_size: 100,
            emergency_trigger_health: 20.0,
            core_components: BTreeSet::new(),
            levels: LevelTable::default(),
            strategies: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DwellFloor {
    /// Lowest level that was stuck; the floor holds while health maps here or worse.
    stuck: u8,
    floor: u8,
}

/// Mutable runtime state. Only touched while holding the core lock, which
/// serializes snapshot evaluation, dwell checks and administrative calls.
struct Core {
    state: DegradationState,
    level_since: Instant,
    dwell_floor: Option<DwellFloor>,
    last_snapshot: Option<Arc<SystemHealthMetrics>>,
}

/// Maps health snapshots to a degradation level and drives mitigations.
pub struct GracefulDegradationSystem {
    params: DegradationParams,
    core: tokio::sync::Mutex<Core>,
    view: ArcSwap<DegradationState>,
    history: Mutex<VecDeque<DegradationEvent>>,
    failed_activations: Mutex<VecDeque<FailedActivation>>,

    breakers: Option<Arc<CircuitBreakerManager>>,
    hooks: RwLock<HashMap<String, Arc<dyn ComponentHooks>>>,
    feature_probes: RwLock<HashMap<String, Arc<dyn FeatureProbe>>>,

    events: EventBus,
    shutting_down: AtomicBool,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for GracefulDegradationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let view = self.view.load();
        f.debug_struct("GracefulDegradationSystem")
            .field("level", &view.level)
            .field("emergency_mode", &view.emergency_mode)
            .field("active_strategies", &view.active_strategies.len())
            .finish()
    }
}

impl GracefulDegradationSystem {
    pub fn new(
        params: DegradationParams,
        breakers: Option<Arc<CircuitBreakerManager>>,
        events: EventBus,
    ) -> Self {
        let state = DegradationState::initial(params.levels.name_of(0));
        let view = ArcSwap::from_pointee(state.clone());

        Self {
            core: tokio::sync::Mutex::new(Core {
                state,
                level_since: Instant::now(),
                dwell_floor: None,
                last_snapshot: None,
            }),
            view,
            history: Mutex::new(VecDeque::new()),
            failed_activations: Mutex::new(VecDeque::new()),
            breakers,
            hooks: RwLock::new(HashMap::new()),
            feature_probes: RwLock::new(HashMap::new()),
            events,
            shutting_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            params,
        }
    }

    pub fn params(&self) -> &DegradationParams {
        &self.params
    }

    pub fn register_hooks(&self, component: &str, hooks: Arc<dyn ComponentHooks>) {
        self.hooks.write().insert(component.to_string(), hooks);
    }

    pub fn register_feature_probe(&self, feature: &str, probe: Arc<dyn FeatureProbe>) {
        self.feature_probes.write().insert(feature.to_string(), probe);
    }

    // ---------------------------
    // Introspection
    // ---------------------------

    pub fn current_state(&self) -> Arc<DegradationState> {
        self.view.load_full()
    }

    pub fn current_level(&self) -> u8 {
        self.view.load().level
    }

    pub fn is_in_emergency_mode(&self) -> bool {
        self.view.load().emergency_mode
    }

    pub fn active_strategies(&self) -> Vec<ActiveStrategy> {
        self.view.load().active_strategies.clone()
    }

    pub fn history(&self) -> Vec<DegradationEvent> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn failed_activations(&self) -> Vec<FailedActivation> {
        self.failed_activations.lock().iter().cloned().collect()
    }

    fn publish_view(&self, core: &Core) {
        self.view.store(Arc::new(core.state.clone()));
    }

    fn ensure_running(&self) -> Result<(), DegradationError> {
        if self.shutting_down.load(Ordering::Acquire) {
            Err(DegradationError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    // ---------------------------
    // Evaluation
    // ---------------------------

    /// Evaluates one health snapshot and returns the resulting level.
    ///
    /// Snapshots not newer than the last processed one are ignored.
    pub async fn process_health_snapshot(
        &self,
        snapshot: Arc<SystemHealthMetrics>,
    ) -> Result<u8, DegradationError> {
        self.ensure_running()?;
        let mut core = self.core.lock().await;
        self.ensure_running()?;

        if snapshot.sequence <= core.state.last_sequence {
            debug!(
                sequence = snapshot.sequence,
                last = core.state.last_sequence,
                "stale health snapshot ignored"
            );
            return Ok(core.state.level);
        }

        core.state.last_sequence = snapshot.sequence;
        core.state.last_health = Some(snapshot.overall_health);
        refresh_components(&mut core, &snapshot);
        core.last_snapshot = Some(Arc::clone(&snapshot));

        self.evaluate(&mut core, &snapshot).await;

        self.publish_view(&core);
        Ok(core.state.level)
    }

    async fn evaluate(&self, core: &mut Core, snapshot: &SystemHealthMetrics) {
        let health = snapshot.overall_health;
        let trigger = self.params.emergency_trigger_health;
        let mut recovered = false;

        let escalated = self.escalated_level(core, snapshot);
        // Budgets and dwell floors can hold the worst level above the trigger.
        let can_leave_emergency = escalated.0 < self.params.levels.max_level();

        if core.state.emergency_mode
            && health > trigger
            && can_leave_emergency
            && self.params.auto_recovery
        {
            self.recover(core, health, true).await;
            recovered = true;
        }

        let previous = core.state.level;
        let (target, reason) = self.target_level(core, health, escalated);
        if target != previous {
            self.transition(core, target, reason, Some(health)).await;
            if target < previous && self.params.auto_recovery && !recovered {
                self.recover(core, health, can_leave_emergency).await;
            }
        }

        if health < trigger && !core.state.emergency_mode {
            self.enter_emergency(core, health);
        }

        if self.params.auto_activate_strategies && core.state.level > 0 {
            self.auto_activate(core, snapshot).await;
        }
    }

    /// Level demanded by health, priority escalation and any dwell floor.
    fn escalated_level(&self, core: &mut Core, snapshot: &SystemHealthMetrics) -> (u8, &'static str) {
        let levels = &self.params.levels;
        let health = snapshot.overall_health;

        let health_level = levels.level_for_health(health);
        let escalated = levels.escalate(health_level, &FailureCounts::of(snapshot));
        let mut target = escalated;
        let mut reason = if escalated > health_level {
            "priority_escalation"
        } else if escalated > core.state.level {
            "health_declined"
        } else {
            "health_recovered"
        };

        if let Some(floor) = core.dwell_floor {
            if health_level < floor.stuck {
                core.dwell_floor = None;
            } else if floor.floor > target {
                target = floor.floor;
                reason = "dwell_floor";
            }
        }

        (target, reason)
    }

    fn target_level(
        &self,
        core: &Core,
        health: f64,
        (mut target, mut reason): (u8, &'static str),
    ) -> (u8, &'static str) {
        let max = self.params.levels.max_level();

        if health < self.params.emergency_trigger_health || core.state.emergency_mode {
            target = max;
            reason = "emergency";
        } else if core.state.level == max && target == 0 {
            // Leaving the worst level always passes through level 1.
            target = 1.min(max);
        }

        (target, reason)
    }

    async fn transition(&self, core: &mut Core, to: u8, reason: &str, health: Option<f64>) {
        let from = core.state.level;
        core.state.level = to;
        core.state.level_name = self.params.levels.name_of(to).to_string();
        core.state.last_state_change = Utc::now();
        core.level_since = Instant::now();

        {
            let mut history = self.history.lock();
            if history.len() >= self.params.history_size.max(1) {
                history.pop_front();
            }
            history.push_back(DegradationEvent {
                at: core.state.last_state_change,
                from,
                to,
                reason: reason.to_string(),
                health,
            });
        }

        info!(
            event = "degradation_level_changed",
            from = from,
            to = to,
            level = %core.state.level_name,
            reason = reason,
            health = ?health
        );
        self.events.publish(ControlPlaneEvent::LevelChanged {
            from,
            to,
            reason: reason.to_string(),
            health,
        });

        let Some(level) = self.params.levels.get(to) else {
            return;
        };
        let was_emergency = core.state.emergency_mode;
        for action in &level.actions {
            self.execute_level_action(core, action).await;
        }
        // Entering emergency mode sends its own notification.
        let entered_emergency = core.state.emergency_mode && !was_emergency;
        if to >= 2
            && !entered_emergency
            && let Some(message) = &level.notification
        {
            self.notify(to, message);
        }
    }

    async fn execute_level_action(&self, core: &mut Core, action: &LevelAction) {
        debug!(level = core.state.level, action = ?action, "executing level action");
        match action {
            LevelAction::ActivateFallback { component } => {
                let status = core
                    .last_snapshot
                    .as_ref()
                    .and_then(|s| s.status_of(component));
                if let Err(e) = self.activate(core, component, status, false).await {
                    warn!(component = %component, error = %e, "level fallback not activated");
                }
            }
            LevelAction::IsolateComponent { component } => {
                self.isolate(core, component, "isolated_by_level");
            }
            LevelAction::ShedCapacity { percent } => {
                let capacity = 100u8.saturating_sub((*percent).min(100));
                if capacity < core.state.capacity_percent {
                    core.state.capacity_percent = capacity;
                    info!(event = "capacity_shed", capacity_percent = capacity);
                }
            }
            LevelAction::DisableFeature { feature } => {
                if core.state.disabled_features.insert(feature.clone()) {
                    info!(event = "feature_disabled", feature = %feature);
                }
            }
            LevelAction::EnterEmergencyMode => {
                if !core.state.emergency_mode {
                    let health = core.state.last_health.unwrap_or(0.0);
                    self.enter_emergency(core, health);
                }
            }
            LevelAction::RestartComponent { component } => {
                let hooks = self.hooks.read().get(component).cloned();
                match hooks {
                    Some(hooks) => match hooks.restart().await {
                        Ok(()) => info!(event = "component_restarted", component = %component),
                        Err(e) => warn!(component = %component, error = %e, "component restart failed"),
                    },
                    None => warn!(component = %component, "no restart hook registered"),
                }
            }
        }
    }

    async fn auto_activate(&self, core: &mut Core, snapshot: &SystemHealthMetrics) {
        let targets: Vec<(String, ComponentStatus)> = snapshot
            .components
            .values()
            .filter(|c| c.status != ComponentStatus::Healthy)
            .filter(|c| core.state.active_strategy(&c.name).is_none())
            .filter(|c| {
                self.params
                    .strategies
                    .get(&c.name)
                    .map(|s| s.applies_to(c.status))
                    .unwrap_or(false)
            })
            .map(|c| (c.name.clone(), c.status))
            .collect();

        for (component, status) in targets {
            if let Err(e) = self.activate(core, &component, Some(status), false).await {
                debug!(component = %component, error = %e, "automatic fallback activation failed");
            }
        }
    }

    // ---------------------------
    // Strategies
    // ---------------------------

    async fn activate(
        &self,
        core: &mut Core,
        component: &str,
        status: Option<ComponentStatus>,
        force: bool,
    ) -> Result<ActiveStrategy, DegradationError> {
        let strategy = self
            .params
            .strategies
            .get(component)
            .ok_or_else(|| DegradationError::UnknownStrategy {
                component: component.to_string(),
            })?;

        if let Some(existing) = core.state.active_strategy(component) {
            return Ok(existing.clone());
        }

        if !force
            && let Some(status) = status
            && !strategy.applies_to(status)
        {
            return Err(DegradationError::NotApplicable {
                component: component.to_string(),
                status,
            });
        }

        let hooks = self.hooks.read().get(component).cloned();
        let mut record = ActiveStrategy {
            component: component.to_string(),
            strategy: strategy.name.clone(),
            activated_at: Utc::now(),
            executed_actions: Vec::with_capacity(strategy.actions.len()),
            reversible: strategy.reversible,
            status: StrategyStatus::Activating,
        };

        for action in &strategy.actions {
            match self.apply_action(component, hooks.as_deref(), action).await {
                Ok(()) => record.executed_actions.push(action.clone()),
                Err(e) if action.critical => {
                    self.rollback(component, hooks.as_deref(), &record.executed_actions)
                        .await;
                    record.status = StrategyStatus::Failed;
                    self.record_failed_activation(&record, &e);
                    return Err(DegradationError::ActivationFailed {
                        component: component.to_string(),
                        strategy: strategy.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        component = component,
                        action = %action.kind,
                        error = %e,
                        "non-critical fallback action failed; continuing"
                    );
                }
            }
        }

        record.status = StrategyStatus::Active;
        core.state.active_strategies.push(record.clone());
        self.recompute_lost_functionality(core);

        info!(
            event = "strategy_activated",
            component = component,
            strategy = %record.strategy,
            actions = record.executed_actions.len(),
            performance_impact = strategy.performance_impact
        );
        self.events.publish(ControlPlaneEvent::StrategyActivated {
            component: component.to_string(),
            strategy: record.strategy.clone(),
        });
        Ok(record)
    }

    /// Reverts (or, when forced, drops) the component's active strategy.
    ///
    /// A strategy whose revert fails stays active with the actions that
    /// could not be reverted.
    async fn deactivate(
        &self,
        core: &mut Core,
        component: &str,
        force: bool,
    ) -> Result<ActiveStrategy, DegradationError> {
        let idx = core
            .state
            .active_strategies
            .iter()
            .position(|s| s.component == component)
            .ok_or_else(|| DegradationError::NotActive {
                component: component.to_string(),
            })?;

        if !core.state.active_strategies[idx].reversible {
            if !force {
                return Err(DegradationError::NotReversible {
                    component: component.to_string(),
                });
            }
            let dropped = core.state.active_strategies.remove(idx);
            self.recompute_lost_functionality(core);
            warn!(
                event = "strategy_dropped",
                component = component,
                strategy = %dropped.strategy,
                "non-reversible strategy dropped without revert"
            );
            self.events.publish(ControlPlaneEvent::StrategyDeactivated {
                component: component.to_string(),
                strategy: dropped.strategy.clone(),
            });
            return Ok(dropped);
        }

        let hooks = self.hooks.read().get(component).cloned();
        core.state.active_strategies[idx].status = StrategyStatus::Reverting;

        while let Some(action) = core.state.active_strategies[idx].executed_actions.last().cloned() {
            if let Err(e) = self.revert_action(component, hooks.as_deref(), &action).await {
                core.state.active_strategies[idx].status = StrategyStatus::Active;
                warn!(
                    component = component,
                    action = %action.kind,
                    error = %e,
                    "fallback revert failed; strategy stays active"
                );
                return Err(DegradationError::RevertFailed {
                    component: component.to_string(),
                    reason: e.to_string(),
                });
            }
            core.state.active_strategies[idx].executed_actions.pop();
        }

        let mut reverted = core.state.active_strategies.remove(idx);
        reverted.status = StrategyStatus::Reverted;
        self.recompute_lost_functionality(core);

        info!(event = "strategy_deactivated", component = component, strategy = %reverted.strategy);
        self.events.publish(ControlPlaneEvent::StrategyDeactivated {
            component: component.to_string(),
            strategy: reverted.strategy.clone(),
        });
        Ok(reverted)
    }

    async fn apply_action(
        &self,
        component: &str,
        hooks: Option<&dyn ComponentHooks>,
        action: &FallbackAction,
    ) -> Result<(), ActionError> {
        if action.kind == FallbackActionKind::Isolate
            && let Some(breakers) = &self.breakers
        {
            let target = action.target.as_deref().unwrap_or(component);
            breakers.force_state(target, CircuitState::Open, "fallback_isolate");
        }
        match hooks {
            Some(hooks) => hooks.apply(action).await,
            None => Ok(()),
        }
    }

    async fn revert_action(
        &self,
        component: &str,
        hooks: Option<&dyn ComponentHooks>,
        action: &FallbackAction,
    ) -> Result<(), ActionError> {
        if let Some(hooks) = hooks {
            hooks.revert(action).await?;
        }
        if action.kind == FallbackActionKind::Isolate
            && let Some(breakers) = &self.breakers
        {
            let target = action.target.as_deref().unwrap_or(component);
            breakers.force_state(target, CircuitState::Closed, "fallback_reverted");
        }
        Ok(())
    }

    async fn rollback(&self, component: &str, hooks: Option<&dyn ComponentHooks>, executed: &[FallbackAction]) {
        for action in executed.iter().rev() {
            if let Err(e) = self.revert_action(component, hooks, action).await {
                warn!(component = component, action = %action.kind, error = %e, "rollback step failed");
            }
        }
    }

    fn record_failed_activation(&self, record: &ActiveStrategy, error: &ActionError) {
        warn!(
            event = "strategy_failed",
            component = %record.component,
            strategy = %record.strategy,
            error = %error
        );

        {
            let mut failed = self.failed_activations.lock();
            if failed.len() >= self.params.history_size.max(1) {
                failed.pop_front();
            }
            failed.push_back(FailedActivation {
                at: Utc::now(),
                component: record.component.clone(),
                strategy: record.strategy.clone(),
                error: error.to_string(),
            });
        }

        self.events.publish(ControlPlaneEvent::StrategyFailed {
            component: record.component.clone(),
            strategy: record.strategy.clone(),
            error: error.to_string(),
        });
    }

    fn recompute_lost_functionality(&self, core: &mut Core) {
        let strategies = &self.params.strategies;
        core.state.recompute_lost_functionality(|component| {
            strategies
                .get(component)
                .map(|s| s.functionality_lost.clone())
                .unwrap_or_default()
        });
    }

    // ---------------------------
    // Isolation and emergency mode
    // ---------------------------

    fn isolate(&self, core: &mut Core, component: &str, reason: &str) {
        if let Some(breakers) = &self.breakers {
            breakers.force_state(component, CircuitState::Open, reason);
        }
        core.state.isolated_components.insert(component.to_string());
        core.state.failed_components.insert(component.to_string());
        debug!(component = component, reason = reason, "component isolated");
    }

    fn release(&self, core: &mut Core, component: &str) {
        if !core.state.isolated_components.remove(component) {
            return;
        }
        if let Some(breakers) = &self.breakers {
            breakers.force_state(component, CircuitState::Closed, "isolation_released");
        }
        let still_failed = core
            .last_snapshot
            .as_ref()
            .and_then(|s| s.status_of(component))
            .map(|status| status.is_failed())
            .unwrap_or(false);
        if !still_failed {
            core.state.failed_components.remove(component);
        }
        debug!(component = component, "component isolation released");
    }

    fn enter_emergency(&self, core: &mut Core, health: f64) {
        core.state.emergency_mode = true;

        let mut known: BTreeSet<String> = self.params.strategies.keys().cloned().collect();
        known.extend(self.hooks.read().keys().cloned());
        if let Some(snapshot) = &core.last_snapshot {
            known.extend(snapshot.components.keys().cloned());
        }
        let isolated: Vec<String> = known
            .into_iter()
            .filter(|c| !self.params.core_components.contains(c))
            .collect();
        for component in &isolated {
            self.isolate(core, component, "emergency_isolation");
        }

        warn!(
            event = "emergency_mode",
            active = true,
            health = health,
            isolated = isolated.len()
        );
        self.events
            .publish(ControlPlaneEvent::EmergencyActivated { health, isolated });

        let max = self.params.levels.max_level();
        let message = self
            .params
            .levels
            .get(max)
            .and_then(|l| l.notification.clone())
            .unwrap_or_else(|| "Emergency mode activated".to_string());
        self.notify(max, &message);
    }

    fn exit_emergency(&self, core: &mut Core, health: f64) {
        core.state.emergency_mode = false;

        let level = core.state.level;
        let isolated: Vec<String> = core.state.isolated_components.iter().cloned().collect();
        for component in isolated {
            let demanded = self.params.levels.demands(level, |a| {
                matches!(a, LevelAction::IsolateComponent { component: c } if *c == component)
            });
            if !demanded {
                self.release(core, &component);
            }
        }

        info!(event = "emergency_mode", active = false, health = health);
        self.events
            .publish(ControlPlaneEvent::EmergencyDeactivated { health });
        self.notify(level, "Emergency mode deactivated");
    }

    fn notify(&self, level: u8, message: &str) {
        info!(event = "user_notification", level = level, message = message);
        self.events.publish(ControlPlaneEvent::UserNotification {
            level,
            message: message.to_string(),
        });
    }

    // ---------------------------
    // Recovery
    // ---------------------------

    async fn recover(&self, core: &mut Core, health: f64, leave_emergency: bool) {
        core.state.auto_recovery_attempts = core.state.auto_recovery_attempts.saturating_add(1);
        info!(
            event = "auto_recovery",
            attempt = core.state.auto_recovery_attempts,
            level = core.state.level,
            health = health
        );

        if leave_emergency
            && core.state.emergency_mode
            && health > self.params.emergency_trigger_health
        {
            self.exit_emergency(core, health);
        }

        let level = core.state.level;
        let levels = &self.params.levels;

        let revertible: Vec<String> = core
            .state
            .active_strategies
            .iter()
            .filter(|s| s.reversible)
            .filter(|s| {
                !core.state.failed_components.contains(&s.component)
                    && !core.state.degraded_components.contains(&s.component)
            })
            .filter(|s| {
                !levels.demands(level, |a| {
                    matches!(a, LevelAction::ActivateFallback { component } if *component == s.component)
                })
            })
            .map(|s| s.component.clone())
            .collect();
        for component in revertible {
            if let Err(e) = self.deactivate(core, &component, false).await {
                warn!(component = %component, error = %e, "strategy not reverted during recovery");
            }
        }

        let features: Vec<String> = core
            .state
            .disabled_features
            .iter()
            .filter(|f| {
                !levels.demands(level, |a| {
                    matches!(a, LevelAction::DisableFeature { feature } if feature == *f)
                })
            })
            .cloned()
            .collect();
        for feature in features {
            let probe = self.feature_probes.read().get(&feature).cloned();
            let available = match probe {
                Some(probe) => probe.available().await,
                None => true,
            };
            if available {
                core.state.disabled_features.remove(&feature);
                info!(event = "feature_restored", feature = %feature);
            } else {
                debug!(feature = %feature, "feature still unavailable");
            }
        }

        let capacity = levels.capacity_for(level);
        if capacity != core.state.capacity_percent {
            core.state.capacity_percent = capacity;
            info!(event = "capacity_restored", capacity_percent = capacity);
        }

        if !core.state.emergency_mode {
            let isolated: Vec<String> = core.state.isolated_components.iter().cloned().collect();
            for component in isolated {
                let demanded = levels.demands(level, |a| {
                    matches!(a, LevelAction::IsolateComponent { component: c } if *c == component)
                });
                if !demanded {
                    self.release(core, &component);
                }
            }
        }
    }

    // ---------------------------
    // Administrative calls
    // ---------------------------

    pub async fn force_degradation_level(&self, level: u8) -> Result<(), DegradationError> {
        self.ensure_running()?;
        if self.params.levels.get(level).is_none() {
            return Err(DegradationError::UnknownLevel { level });
        }

        let mut core = self.core.lock().await;
        let previous = core.state.level;
        if level != previous {
            let health = core.state.last_health;
            self.transition(&mut core, level, "forced", health).await;
            if level < previous && self.params.auto_recovery {
                let leave_emergency = level < self.params.levels.max_level();
                self.recover(&mut core, health.unwrap_or(0.0), leave_emergency)
                    .await;
            }
        }
        self.publish_view(&core);
        Ok(())
    }

    /// Activates the component's strategy regardless of its current status.
    /// Returns the existing record when one is already active.
    pub async fn force_activate_strategy(
        &self,
        component: &str,
    ) -> Result<ActiveStrategy, DegradationError> {
        self.ensure_running()?;
        let mut core = self.core.lock().await;
        let status = core
            .last_snapshot
            .as_ref()
            .and_then(|s| s.status_of(component));
        let result = self.activate(&mut core, component, status, true).await;
        self.publish_view(&core);
        result
    }

    /// Reverts the component's active strategy. Non-reversible strategies are
    /// dropped without a revert.
    pub async fn force_deactivate_strategy(
        &self,
        component: &str,
    ) -> Result<ActiveStrategy, DegradationError> {
        self.ensure_running()?;
        let mut core = self.core.lock().await;
        let result = self.deactivate(&mut core, component, true).await;
        self.publish_view(&core);
        result
    }

    /// Runs one recovery attempt now.
    pub async fn attempt_recovery(&self) -> Result<(), DegradationError> {
        self.ensure_running()?;
        let mut core = self.core.lock().await;
        let health = core.state.last_health.unwrap_or(0.0);
        let leave_emergency = match core.last_snapshot.clone() {
            Some(snapshot) => {
                self.escalated_level(&mut core, &snapshot).0 < self.params.levels.max_level()
            }
            None => true,
        };
        self.recover(&mut core, health, leave_emergency).await;
        self.publish_view(&core);
        Ok(())
    }

    /// Escalates one level when the current level outlived its maximum
    /// duration. Skipped while another evaluation holds the state.
    pub async fn evaluate_dwell(&self) -> bool {
        if self.ensure_running().is_err() {
            return false;
        }
        let Ok(mut core) = self.core.try_lock() else {
            debug!("evaluation in progress; dwell check skipped");
            return false;
        };

        let level = core.state.level;
        if level == 0 || level >= self.params.levels.max_level() {
            return false;
        }
        let Some(limit) = self.params.levels.get(level).and_then(|l| l.max_duration) else {
            return false;
        };
        if core.level_since.elapsed() < limit {
            return false;
        }

        let stuck = core.dwell_floor.map(|f| f.stuck.min(level)).unwrap_or(level);
        core.dwell_floor = Some(DwellFloor {
            stuck,
            floor: level + 1,
        });
        let health = core.state.last_health;
        self.transition(&mut core, level + 1, "dwell_time_exceeded", health)
            .await;
        self.publish_view(&core);
        true
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Consumes monitor snapshots and runs the dwell timer until shutdown.
    pub fn start(self: &Arc<Self>, mut snapshots: mpsc::Receiver<Arc<SystemHealthMetrics>>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() || self.ensure_running().is_err() {
            return;
        }

        let system = Arc::clone(self);
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    snapshot = snapshots.recv() => {
                        let Some(snapshot) = snapshot else { break };
                        if let Err(e) = system.process_health_snapshot(snapshot).await {
                            debug!(error = %e, "health snapshot not processed");
                        }
                    }
                }
            }
            debug!("degradation snapshot consumer stopped");
        }));

        let system = Arc::clone(self);
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(system.params.evaluation_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        system.evaluate_dwell().await;
                    }
                }
            }
            debug!("degradation dwell timer stopped");
        }));

        info!(
            evaluation_interval_ms = self.params.evaluation_interval.as_millis() as u64,
            levels = self.params.levels.levels().len(),
            strategies = self.params.strategies.len(),
            "degradation system started"
        );
    }

    /// Stops both loops, waits (bounded) for an in-flight evaluation, reverts
    /// reversible strategies best-effort and leaves emergency mode.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();

        match tokio::time::timeout(EVALUATION_GRACE, self.core.lock()).await {
            Ok(mut core) => {
                let reversible: Vec<String> = core
                    .state
                    .active_strategies
                    .iter()
                    .filter(|s| s.reversible)
                    .map(|s| s.component.clone())
                    .collect();
                for component in reversible {
                    if let Err(e) = self.deactivate(&mut core, &component, false).await {
                        warn!(component = %component, error = %e, "strategy not reverted on shutdown");
                    }
                }
                if core.state.emergency_mode {
                    let health = core.state.last_health.unwrap_or(0.0);
                    self.exit_emergency(&mut core, health);
                }
                self.publish_view(&core);
            }
            Err(_) => warn!("in-flight degradation evaluation did not finish within shutdown grace"),
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if tokio::time::timeout(EVALUATION_GRACE, task).await.is_err() {
                warn!("degradation task did not stop within shutdown grace");
            }
        }

        self.hooks.write().clear();
        self.feature_probes.write().clear();
        info!("degradation system stopped");
    }
}

fn refresh_components(core: &mut Core, snapshot: &SystemHealthMetrics) {
    let mut failed: BTreeSet<String> = snapshot
        .failed_components()
        .into_iter()
        .map(|c| c.name.clone())
        .collect();
    failed.extend(core.state.isolated_components.iter().cloned());
    core.state.failed_components = failed;
    core.state.degraded_components = snapshot
        .degraded_components()
        .into_iter()
        .map(|c| c.name.clone())
        .collect();
}
