use crate::circuit_breaker::admin::AdminBreakerView;
use crate::circuit_breaker::breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
use crate::circuit_breaker::error::{BreakerError, GuardError};
use crate::circuit_breaker::guard::CallRecorder;
use crate::circuit_breaker::params::CircuitBreakerParams;
use crate::events::{ControlPlaneEvent, EventBus};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound for a single health probe issued while a circuit is open.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lightweight check run against an open circuit's dependency.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Owns one breaker per named operation.
pub struct CircuitBreakerManager {
    defaults: CircuitBreakerParams,
    overrides: HashMap<String, CircuitBreakerParams>,

    /// Per-operation circuit breaker state machine
    breakers: DashMap<String, CircuitBreaker>,

    probes: DashMap<String, Arc<dyn HealthProbe>>,

    events: EventBus,
}

impl fmt::Debug for CircuitBreakerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerManager")
            .field("breakers", &self.breakers.len())
            .field("probes", &self.probes.len())
            .finish()
    }
}

impl CircuitBreakerManager {
    pub fn new(
        defaults: CircuitBreakerParams,
        overrides: HashMap<String, CircuitBreakerParams>,
        events: EventBus,
    ) -> Result<Self, BreakerError> {
        defaults.validate("default")?;
        for (name, params) in &overrides {
            params.validate(name)?;
        }

        Ok(Self {
            defaults,
            overrides,
            breakers: DashMap::new(),
            probes: DashMap::new(),
            events,
        })
    }

    pub fn with_defaults(events: EventBus) -> Self {
        Self {
            defaults: CircuitBreakerParams::default(),
            overrides: HashMap::new(),
            breakers: DashMap::new(),
            probes: DashMap::new(),
            events,
        }
    }

    /// Registers (or replaces) a breaker with explicit parameters.
    pub fn register(&self, name: &str, params: CircuitBreakerParams) -> Result<(), BreakerError> {
        let breaker = CircuitBreaker::new(name, params)?;
        self.breakers.insert(name.to_string(), breaker);
        Ok(())
    }

    pub fn register_probe(&self, name: &str, probe: Arc<dyn HealthProbe>) {
        self.probes.insert(name.to_string(), probe);
    }

    fn params_for(&self, name: &str) -> CircuitBreakerParams {
        self.overrides
            .get(name)
            .unwrap_or(&self.defaults)
            .clone()
    }

    /// Runs `f` against the named breaker, creating it on first use, and
    /// announces any state change it caused.
    fn with_breaker<R>(&self, name: &str, f: impl FnOnce(&mut CircuitBreaker) -> R) -> R {
        let (out, change) = {
            let mut entry = self
                .breakers
                .entry(name.to_string())
                .or_insert_with(|| {
                    CircuitBreaker::from_validated(name.to_string(), self.params_for(name))
                });

            let before = entry.state();
            let out = f(&mut *entry);

            let change = if entry.state() != before {
                entry
                    .last_transition()
                    .map(|t| (t.from, t.to, t.reason.clone()))
            } else {
                None
            };
            (out, change)
        };

        // Publish outside the map guard.
        if let Some((from, to, reason)) = change {
            self.events.publish(ControlPlaneEvent::CircuitStateChanged {
                breaker: name.to_string(),
                from,
                to,
                reason,
            });
        }

        out
    }

    pub fn can_execute(&self, name: &str) -> bool {
        self.with_breaker(name, |b| b.can_execute())
    }

    /// Admits a call, returning the breaker epoch it was admitted under.
    pub fn admit(&self, name: &str) -> Option<u64> {
        self.with_breaker(name, |b| b.admit())
    }

    pub fn record_result(&self, name: &str, success: bool, duration: Duration, error: Option<&str>) {
        self.with_breaker(name, |b| b.record_result(success, duration, error));
    }

    pub fn record_admitted(
        &self,
        name: &str,
        epoch: u64,
        success: bool,
        duration: Duration,
        error: Option<&str>,
    ) {
        self.with_breaker(name, |b| b.record_admitted(epoch, success, duration, error));
    }

    /// Runs `operation` behind the named breaker.
    ///
    /// The operation is not invoked at all when the circuit rejects the call.
    /// Its result is recorded exactly once, including when the operation
    /// panics or the returned future is dropped before completion.
    pub async fn guard<T, E, F, Fut>(&self, name: &str, operation: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let Some(epoch) = self.admit(name) else {
            debug!(breaker = name, "call rejected by open circuit");
            return Err(GuardError::CircuitOpen {
                name: name.to_string(),
            });
        };

        let recorder = CallRecorder::admitted(self, name, epoch);
        match operation().await {
            Ok(value) => {
                recorder.finish(true, None);
                Ok(value)
            }
            Err(e) => {
                recorder.finish(false, Some(&e.to_string()));
                Err(GuardError::Operation(e))
            }
        }
    }

    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers
            .get(name)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    pub fn metrics(&self, name: &str) -> Option<CircuitBreakerMetrics> {
        self.breakers.get(name).map(|b| b.metrics())
    }

    pub fn all_metrics(&self) -> Vec<(String, CircuitBreakerMetrics)> {
        let mut out: Vec<_> = self
            .breakers
            .iter()
            .map(|b| (b.key().clone(), b.metrics()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn reset(&self, name: &str) -> Result<(), BreakerError> {
        if !self.breakers.contains_key(name) {
            return Err(BreakerError::UnknownBreaker {
                name: name.to_string(),
            });
        }
        self.with_breaker(name, |b| b.reset());
        Ok(())
    }

    pub fn reset_all(&self) {
        let names: Vec<String> = self.breakers.iter().map(|b| b.key().clone()).collect();
        for name in names {
            self.with_breaker(&name, |b| b.reset());
        }
    }

    /// Administrative override. Creates the breaker if it does not exist yet
    /// so that isolating a component also fails its future guarded calls.
    pub fn force_state(&self, name: &str, state: CircuitState, reason: &str) {
        self.with_breaker(name, |b| b.force_state(state, reason));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.breakers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|b| b.key().clone()).collect();
        names.sort();
        names
    }

    pub fn view(&self, name: &str, include_details: bool) -> Option<AdminBreakerView> {
        self.breakers
            .get(name)
            .map(|b| AdminBreakerView::from_breaker(&b, include_details))
    }

    pub fn list(&self, include_details: bool) -> Vec<AdminBreakerView> {
        let mut views: Vec<AdminBreakerView> = self
            .breakers
            .iter()
            .map(|b| AdminBreakerView::from_breaker(&b, include_details))
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }

    /// One round of health probes against open circuits that are due.
    pub async fn run_probes(&self) {
        let now = Instant::now();
        let due: Vec<(String, Arc<dyn HealthProbe>)> = self
            .probes
            .iter()
            .filter(|p| {
                self.breakers
                    .get(p.key())
                    .map(|b| b.probe_due(now))
                    .unwrap_or(false)
            })
            .map(|p| (p.key().clone(), p.value().clone()))
            .collect();

        for (name, probe) in due {
            self.with_breaker(&name, |b| b.mark_probed(now));

            let healthy = match tokio::time::timeout(PROBE_TIMEOUT, probe.probe()).await {
                Ok(healthy) => healthy,
                Err(_) => {
                    warn!(breaker = %name, "health probe timed out");
                    false
                }
            };

            if healthy {
                self.with_breaker(&name, |b| b.probe_succeeded());
            } else {
                debug!(breaker = %name, "health probe failed; circuit stays open");
            }
        }
    }

    /// Smallest probe interval among configured breakers.
    pub fn probe_tick(&self) -> Option<Duration> {
        self.breakers
            .iter()
            .filter_map(|b| b.params().probe_interval)
            .chain(self.defaults.probe_interval)
            .chain(self.overrides.values().filter_map(|p| p.probe_interval))
            .min()
    }

    pub fn spawn_probe_loop(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let tick = self.probe_tick()?;
        let manager = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => manager.run_probes().await,
                }
            }
            debug!("circuit probe loop stopped");
        }))
    }
}
