use crate::events::{ControlPlaneEvent, EventBus};
use crate::health::alerts::{AlertManager, AlertParams, SystemAlert};
use crate::health::component::{
    CheckError, ComponentChecker, ComponentHealth, ComponentReport, ComponentSettings,
    ComponentStatus, IssueReport, IssueSeverity,
};
use crate::health::issues::IssueTracker;
use crate::health::resources::{
    ResourceSample, ResourceSampler, ResourceThresholds, ResourceTracker,
};
use crate::health::scoring;
use crate::health::snapshot::{IntegrityChecker, IntegritySummary, MonitorError, SystemHealthMetrics};
use arc_swap::ArcSwapOption;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on waiting for an in-flight tick during shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct HealthMonitorParams {
    pub interval: Duration,
    pub check_timeout: Duration,
    pub history_size: usize,
    pub response_time_threshold: Duration,
    /// Overall health reported when aggregation itself fails.
    pub degraded_snapshot_health: f64,
    pub snapshot_channel_capacity: usize,
    pub thresholds: ResourceThresholds,
    pub alerts: AlertParams,
    /// Weight and priority by component name; unlisted components use the default.
    pub components: HashMap<String, ComponentSettings>,
}

impl Default for HealthMonitorParams {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            check_timeout: Duration::from_secs(5),
            history_size: 100,
            response_time_threshold: Duration::from_secs(1),
            degraded_snapshot_health: 30.0,
            snapshot_channel_capacity: 16,
            thresholds: ResourceThresholds::default(),
            alerts: AlertParams::default(),
            components: HashMap::new(),
        }
    }
}

struct Registered {
    checker: Arc<dyn ComponentChecker>,
    settings: ComponentSettings,
}

/// Mutable bookkeeping touched once per tick.
struct MonitorState {
    sequence: u64,
    issues: IssueTracker,
    alerts: AlertManager,
    resources: ResourceTracker,
    history: VecDeque<Arc<SystemHealthMetrics>>,
}

struct CheckOutcome {
    name: String,
    settings: ComponentSettings,
    elapsed: Duration,
    result: Result<ComponentReport, CheckError>,
}

/// Periodically checks every registered component and folds the results
/// into one scored snapshot.
pub struct SystemHealthMonitor {
    params: HealthMonitorParams,
    components: RwLock<BTreeMap<String, Registered>>,
    sampler: RwLock<Option<Arc<dyn ResourceSampler>>>,
    integrity: RwLock<Option<Arc<dyn IntegrityChecker>>>,

    state: Mutex<MonitorState>,
    current: ArcSwapOption<SystemHealthMetrics>,
    subscribers: Mutex<Vec<mpsc::Sender<Arc<SystemHealthMetrics>>>>,

    /// Serializes ticks so on-demand checks never overlap the timer.
    tick_lock: tokio::sync::Mutex<()>,
    shutting_down: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    events: EventBus,
}

impl std::fmt::Debug for SystemHealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemHealthMonitor")
            .field("components", &self.components.read().len())
            .field("shutting_down", &self.shutting_down.load(Ordering::Relaxed))
            .finish()
    }
}

impl SystemHealthMonitor {
    pub fn new(params: HealthMonitorParams, events: EventBus) -> Self {
        let state = MonitorState {
            sequence: 0,
            issues: IssueTracker::default(),
            alerts: AlertManager::new(params.alerts.clone(), events.clone()),
            resources: ResourceTracker::new(params.thresholds),
            history: VecDeque::new(),
        };

        Self {
            params,
            components: RwLock::new(BTreeMap::new()),
            sampler: RwLock::new(None),
            integrity: RwLock::new(None),
            state: Mutex::new(state),
            current: ArcSwapOption::empty(),
            subscribers: Mutex::new(Vec::new()),
            tick_lock: tokio::sync::Mutex::new(()),
            shutting_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            events,
        }
    }

    pub fn params(&self) -> &HealthMonitorParams {
        &self.params
    }

    /// Registers a component using its configured weight and priority.
    pub fn register_component(&self, name: &str, checker: Arc<dyn ComponentChecker>) {
        let settings = self
            .params
            .components
            .get(name)
            .copied()
            .unwrap_or_default();
        self.register_component_with(name, checker, settings);
    }

    pub fn register_component_with(
        &self,
        name: &str,
        checker: Arc<dyn ComponentChecker>,
        settings: ComponentSettings,
    ) {
        let replaced = self
            .components
            .write()
            .insert(name.to_string(), Registered { checker, settings })
            .is_some();
        debug!(component = name, replaced, "component registered");
    }

    pub fn unregister_component(&self, name: &str) -> bool {
        let removed = self.components.write().remove(name).is_some();
        if removed {
            let mut state = self.state.lock();
            state.issues.forget(name);
            state.alerts.resolve_component(name);
        }
        removed
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.read().keys().cloned().collect()
    }

    pub fn set_resource_sampler(&self, sampler: Arc<dyn ResourceSampler>) {
        *self.sampler.write() = Some(sampler);
    }

    pub fn set_integrity_checker(&self, checker: Arc<dyn IntegrityChecker>) {
        *self.integrity.write() = Some(checker);
    }

    /// Bounded snapshot feed. A subscriber that falls behind misses snapshots
    /// rather than slowing the monitor down.
    pub fn subscribe_snapshots(&self) -> mpsc::Receiver<Arc<SystemHealthMetrics>> {
        let (tx, rx) = mpsc::channel(self.params.snapshot_channel_capacity.max(1));
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn current_health(&self) -> Option<Arc<SystemHealthMetrics>> {
        self.current.load_full()
    }

    pub fn history(&self) -> Vec<Arc<SystemHealthMetrics>> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn active_alerts(&self) -> Vec<SystemAlert> {
        self.state.lock().alerts.active()
    }

    pub fn alert_history(&self) -> Vec<SystemAlert> {
        self.state.lock().alerts.history()
    }

    pub fn suppressed_alerts(&self) -> u64 {
        self.state.lock().alerts.suppressed()
    }

    pub fn acknowledge_alert(&self, id: &str) -> bool {
        self.state.lock().alerts.acknowledge(id)
    }

    pub fn resolve_alert(&self, id: &str) -> bool {
        self.state.lock().alerts.resolve(id)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Runs one full health check and publishes the resulting snapshot.
    ///
    /// Component failures never fail the check; they are folded into the
    /// snapshot as critical components.
    pub async fn perform_health_check(&self) -> Result<Arc<SystemHealthMetrics>, MonitorError> {
        if self.is_shutting_down() {
            return Err(MonitorError::ShuttingDown);
        }
        let _tick = self.tick_lock.lock().await;
        if self.is_shutting_down() {
            return Err(MonitorError::ShuttingDown);
        }

        let outcomes = self.run_checks().await;
        let integrity = self.run_integrity_check().await;
        let sample = self.sample_resources().await;

        let snapshot = {
            let mut state = self.state.lock();
            let now = Utc::now();

            let mut components = BTreeMap::new();
            for outcome in outcomes {
                let health = self.fold_outcome(&mut state, outcome, now);
                components.insert(health.name.clone(), health);
            }

            let resources = sample
                .map(|s| state.resources.evaluate(&s))
                .unwrap_or_default();

            let component_block = scoring::weighted_component_score(
                &components
                    .values()
                    .map(|c| (c.score, c.weight))
                    .collect::<Vec<_>>(),
            );
            let resource_block = if resources.is_empty() {
                None
            } else {
                let sum: f64 = resources
                    .values()
                    .map(|r| scoring::resource_score(r.status))
                    .sum();
                Some(sum / resources.len() as f64)
            };
            let integrity_block = integrity.as_ref().map(|i| i.score);

            let (overall_health, degraded_reason) =
                match scoring::overall_health(component_block, resource_block, integrity_block) {
                    Ok(h) => (h, None),
                    Err(e) => {
                        warn!(error = %e, "health aggregation failed; reporting degraded snapshot");
                        (self.params.degraded_snapshot_health, Some(e.to_string()))
                    }
                };

            state.sequence += 1;
            let snapshot = Arc::new(SystemHealthMetrics {
                sequence: state.sequence,
                timestamp: now,
                overall_health,
                components,
                resources,
                integrity,
                active_alerts: state.alerts.active(),
                degraded_reason,
            });

            if state.history.len() >= self.params.history_size.max(1) {
                state.history.pop_front();
            }
            state.history.push_back(Arc::clone(&snapshot));
            snapshot
        };

        self.current.store(Some(Arc::clone(&snapshot)));
        debug!(
            event = "health_checked",
            sequence = snapshot.sequence,
            overall_health = snapshot.overall_health,
            components = snapshot.components.len(),
            active_alerts = snapshot.active_alerts.len()
        );
        self.events.publish(ControlPlaneEvent::HealthChecked {
            sequence: snapshot.sequence,
            overall_health: snapshot.overall_health,
            active_alerts: snapshot.active_alerts.len(),
        });
        self.fan_out(&snapshot);

        Ok(snapshot)
    }

    /// Samplers read `/proc` and the filesystem, so sampling runs on the
    /// blocking pool. A sampler that overruns the check timeout is left
    /// behind and the tick goes on without resources.
    async fn sample_resources(&self) -> Option<ResourceSample> {
        let sampler = self.sampler.read().clone()?;
        let timeout = self.params.check_timeout;

        let sampling = tokio::task::spawn_blocking(move || sampler.sample());
        match tokio::time::timeout(timeout, sampling).await {
            Ok(Ok(sample)) => Some(sample),
            Ok(Err(e)) => {
                warn!(error = %e, "resource sampler failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "resource sampling timed out"
                );
                None
            }
        }
    }

    /// Every check runs in its own task under its own timeout; the tick waits
    /// for all of them.
    async fn run_checks(&self) -> Vec<CheckOutcome> {
        let registered: Vec<(String, Arc<dyn ComponentChecker>, ComponentSettings)> = self
            .components
            .read()
            .iter()
            .map(|(name, r)| (name.clone(), Arc::clone(&r.checker), r.settings))
            .collect();

        let timeout = self.params.check_timeout;
        let handles: Vec<_> = registered
            .into_iter()
            .map(|(name, checker, settings)| {
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = match tokio::time::timeout(timeout, checker.check()).await {
                        Ok(result) => result,
                        Err(_) => Err(CheckError::TimedOut {
                            timeout_ms: timeout.as_millis() as u64,
                        }),
                    };
                    (started.elapsed(), result)
                });
                (name, settings, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, settings, handle) in handles {
            let (elapsed, result) = match handle.await {
                Ok(done) => done,
                Err(e) => {
                    warn!(component = %name, error = %e, "health check task failed");
                    (Duration::ZERO, Err(CheckError::Panicked))
                }
            };
            outcomes.push(CheckOutcome {
                name,
                settings,
                elapsed,
                result,
            });
        }
        outcomes
    }

    async fn run_integrity_check(&self) -> Option<IntegritySummary> {
        let checker = self.integrity.read().clone()?;
        match tokio::time::timeout(self.params.check_timeout, checker.check()).await {
            Ok(summary) => Some(summary),
            Err(_) => {
                warn!("data integrity check timed out");
                Some(IntegritySummary {
                    score: 0.0,
                    checks_passed: 0,
                    checks_failed: 1,
                    details: vec!["integrity check timed out".to_string()],
                })
            }
        }
    }

    fn fold_outcome(
        &self,
        state: &mut MonitorState,
        outcome: CheckOutcome,
        now: chrono::DateTime<Utc>,
    ) -> ComponentHealth {
        let CheckOutcome {
            name,
            settings,
            elapsed,
            result,
        } = outcome;

        let health = match result {
            Ok(report) => {
                let response_time = report.response_time.unwrap_or(elapsed);
                let issues = state.issues.observe(&name, &report.issues, now);
                let score = scoring::component_score(
                    report.status,
                    Some(response_time),
                    self.params.response_time_threshold,
                    report.error_rate,
                    issues.len(),
                );
                ComponentHealth {
                    name,
                    status: report.status,
                    score,
                    priority: settings.priority,
                    weight: settings.weight,
                    response_time_ms: Some(response_time.as_millis() as u64),
                    error_rate: report.error_rate,
                    issues,
                    metrics: report.metrics,
                    last_checked: now,
                }
            }
            Err(e) => {
                warn!(component = %name, error = %e, "component health check failed");
                let issue = IssueReport::new(IssueSeverity::Critical, e.category(), e.to_string());
                let issues = state.issues.observe(&name, &[issue], now);
                ComponentHealth {
                    name,
                    status: ComponentStatus::Critical,
                    score: 0.0,
                    priority: settings.priority,
                    weight: settings.weight,
                    response_time_ms: None,
                    error_rate: 1.0,
                    issues,
                    metrics: BTreeMap::new(),
                    last_checked: now,
                }
            }
        };

        state.alerts.reconcile(&health.name, &health.issues);
        health
    }

    fn fan_out(&self, snapshot: &Arc<SystemHealthMetrics>) {
        self.subscribers.lock().retain(|tx| {
            match tx.try_send(Arc::clone(snapshot)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        sequence = snapshot.sequence,
                        "snapshot subscriber is lagging; snapshot dropped"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Starts the periodic check loop. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() || self.is_shutting_down() {
            return;
        }

        let monitor = Arc::clone(self);
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.params.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = monitor.perform_health_check().await {
                            debug!(error = %e, "health tick skipped");
                        }
                    }
                }
            }
            debug!("health monitor loop stopped");
        }));

        info!(
            interval_ms = self.params.interval.as_millis() as u64,
            components = self.components.read().len(),
            "health monitor started"
        );
    }

    /// Stops the loop, waits (bounded) for an in-flight tick and releases
    /// every registered component.
    pub async fn stop(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();

        if tokio::time::timeout(SHUTDOWN_GRACE, self.tick_lock.lock())
            .await
            .is_err()
        {
            warn!("in-flight health check did not finish within shutdown grace");
        }

        let task = self.task.lock().take();
        if let Some(task) = task
            && tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err()
        {
            warn!("health monitor loop did not stop within shutdown grace");
        }

        self.components.write().clear();
        *self.sampler.write() = None;
        *self.integrity.write() = None;
        self.subscribers.lock().clear();
        info!("health monitor stopped");
    }
}
