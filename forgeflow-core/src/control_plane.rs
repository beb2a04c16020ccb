use crate::circuit_breaker::{BreakerError, CircuitBreakerManager, CircuitBreakerParams};
use crate::conf::{ResourceSamplingParams, RuntimeParams};
use crate::degradation::{ComponentHooks, DegradationParams, FeatureProbe, GracefulDegradationSystem};
use crate::events::EventBus;
use crate::health::{
    BreakerAggregateChecker, ComponentChecker, ComponentSettings, HealthMonitorParams,
    IntegrityChecker, ProcResourceSampler, ResourceSampler, SHUTDOWN_GRACE, SystemHealthMonitor,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Component name of the breaker aggregate checker.
pub const BREAKERS_COMPONENT: &str = "circuit_breakers";

/// Breaker manager, health monitor and degradation system wired together.
///
/// Snapshots flow from the monitor to the degradation system over a bounded
/// channel; everything else is announced on the shared [`EventBus`].
pub struct ControlPlane {
    events: EventBus,
    breakers: Arc<CircuitBreakerManager>,
    monitor: Arc<SystemHealthMonitor>,
    degradation: Arc<GracefulDegradationSystem>,
    cancel: CancellationToken,
    probe_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl ControlPlane {
    pub fn builder() -> ControlPlaneBuilder {
        ControlPlaneBuilder::default()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    pub fn monitor(&self) -> &Arc<SystemHealthMonitor> {
        &self.monitor
    }

    pub fn degradation(&self) -> &Arc<GracefulDegradationSystem> {
        &self.degradation
    }

    /// Starts the breaker probe loop, the degradation loops and the monitor
    /// timer. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        *self.probe_task.lock() = self.breakers.spawn_probe_loop(self.cancel.clone());

        // Subscribe before the first tick so no snapshot is missed.
        self.degradation.start(self.monitor.subscribe_snapshots());
        self.monitor.start();

        info!(
            components = self.monitor.component_names().len(),
            breakers = self.breakers.names().len(),
            "control plane started"
        );
    }

    /// Stops the monitor first, then the degradation system, then the probe
    /// loop. Each step waits a bounded time for in-flight work.
    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        self.degradation.shutdown().await;

        self.cancel.cancel();
        let probe = self.probe_task.lock().take();
        if let Some(task) = probe
            && tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err()
        {
            warn!("circuit probe loop did not stop within shutdown grace");
        }

        info!("control plane stopped");
    }
}

#[derive(Default)]
pub struct ControlPlaneBuilder {
    events: Option<EventBus>,
    breaker_defaults: CircuitBreakerParams,
    breaker_overrides: HashMap<String, CircuitBreakerParams>,
    monitor: HealthMonitorParams,
    degradation: DegradationParams,
    sampler: Option<Arc<dyn ResourceSampler>>,
    integrity: Option<Arc<dyn IntegrityChecker>>,
    components: Vec<(String, Arc<dyn ComponentChecker>, Option<ComponentSettings>)>,
    hooks: Vec<(String, Arc<dyn ComponentHooks>)>,
    feature_probes: Vec<(String, Arc<dyn FeatureProbe>)>,
    breaker_health: bool,
}

impl ControlPlaneBuilder {
    /// Takes every parameter lowered from a configuration file.
    pub fn params(mut self, params: RuntimeParams) -> Self {
        self.breaker_defaults = params.breaker_defaults;
        self.breaker_overrides = params.breaker_overrides;
        self.monitor = params.monitor;
        self.degradation = params.degradation;
        if let Some(ResourceSamplingParams {
            disk_path,
            network_capacity_bytes_per_sec,
        }) = params.resources
        {
            self.sampler = Some(Arc::new(ProcResourceSampler::new(
                disk_path,
                network_capacity_bytes_per_sec,
            )));
        }
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn breaker_defaults(mut self, params: CircuitBreakerParams) -> Self {
        self.breaker_defaults = params;
        self
    }

    pub fn breaker(mut self, name: &str, params: CircuitBreakerParams) -> Self {
        self.breaker_overrides.insert(name.to_string(), params);
        self
    }

    pub fn monitor_params(mut self, params: HealthMonitorParams) -> Self {
        self.monitor = params;
        self
    }

    pub fn degradation_params(mut self, params: DegradationParams) -> Self {
        self.degradation = params;
        self
    }

    pub fn resource_sampler(mut self, sampler: Arc<dyn ResourceSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn integrity_checker(mut self, checker: Arc<dyn IntegrityChecker>) -> Self {
        self.integrity = Some(checker);
        self
    }

    /// Registers a component with the settings configured for its name.
    pub fn component(mut self, name: &str, checker: Arc<dyn ComponentChecker>) -> Self {
        self.components.push((name.to_string(), checker, None));
        self
    }

    pub fn component_with(
        mut self,
        name: &str,
        checker: Arc<dyn ComponentChecker>,
        settings: ComponentSettings,
    ) -> Self {
        self.components
            .push((name.to_string(), checker, Some(settings)));
        self
    }

    pub fn hooks(mut self, component: &str, hooks: Arc<dyn ComponentHooks>) -> Self {
        self.hooks.push((component.to_string(), hooks));
        self
    }

    pub fn feature_probe(mut self, feature: &str, probe: Arc<dyn FeatureProbe>) -> Self {
        self.feature_probes.push((feature.to_string(), probe));
        self
    }

    /// Also report the breakers' aggregate state as a component.
    pub fn breaker_health(mut self, enabled: bool) -> Self {
        self.breaker_health = enabled;
        self
    }

    pub fn build(self) -> Result<ControlPlane, BreakerError> {
        let events = self.events.unwrap_or_default();

        let breakers = Arc::new(CircuitBreakerManager::new(
            self.breaker_defaults,
            self.breaker_overrides,
            events.clone(),
        )?);

        let monitor = Arc::new(SystemHealthMonitor::new(self.monitor, events.clone()));
        if let Some(sampler) = self.sampler {
            monitor.set_resource_sampler(sampler);
        }
        if let Some(integrity) = self.integrity {
            monitor.set_integrity_checker(integrity);
        }
        for (name, checker, settings) in self.components {
            match settings {
                Some(settings) => monitor.register_component_with(&name, checker, settings),
                None => monitor.register_component(&name, checker),
            }
        }
        if self.breaker_health {
            monitor.register_component(
                BREAKERS_COMPONENT,
                Arc::new(BreakerAggregateChecker::new(Arc::clone(&breakers))),
            );
        }

        let degradation = Arc::new(GracefulDegradationSystem::new(
            self.degradation,
            Some(Arc::clone(&breakers)),
            events.clone(),
        ));
        for (component, hooks) in self.hooks {
            degradation.register_hooks(&component, hooks);
        }
        for (feature, probe) in self.feature_probes {
            degradation.register_feature_probe(&feature, probe);
        }

        Ok(ControlPlane {
            events,
            breakers,
            monitor,
            degradation,
            cancel: CancellationToken::new(),
            probe_task: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }
}
