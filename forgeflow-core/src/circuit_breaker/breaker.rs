use crate::circuit_breaker::adaptive::{self, Thresholds};
use crate::circuit_breaker::error::BreakerError;
use crate::circuit_breaker::params::CircuitBreakerParams;
use crate::circuit_breaker::window::ResultWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Most recent state transitions kept per breaker.
pub const TRANSITION_LOG_SIZE: usize = 50;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half-open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failures: u64,
    pub successes: u64,
    pub total_calls: u64,
    /// Decaying failure count compared against the failure threshold.
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_rate: f64,
    pub slow_call_rate: f64,
    pub average_response_time: Duration,
    pub time_in_current_state: Duration,
    pub failure_threshold: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    params: CircuitBreakerParams,

    // effective thresholds, moved by adaptive tuning
    failure_threshold: u32,
    timeout: Duration,

    // state machine data
    pub(crate) state: CircuitState,
    state_since: Instant,
    /// Bumped on every transition; admitted calls carry it back with their result.
    epoch: u64,

    // Closed
    pub(crate) failure_count: u32,
    calls_since_close: u64,

    // Open
    pub(crate) next_attempt_at: Option<Instant>,
    pub(crate) opened_at_system: Option<DateTime<Utc>>,
    last_probe_at: Option<Instant>,

    // HalfOpen
    pub(crate) half_open_in_flight: u32,
    pub(crate) half_open_successes: u32,

    // statistics since the last reset
    failures: u64,
    successes: u64,
    total_calls: u64,
    last_failure_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    window: ResultWindow,
    results_since_adjustment: u32,

    transitions: VecDeque<StateTransition>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, params: CircuitBreakerParams) -> Result<Self, BreakerError> {
        let name = name.into();
        params.validate(&name)?;
        Ok(Self::from_validated(name, params))
    }

    pub(crate) fn from_validated(name: String, params: CircuitBreakerParams) -> Self {
        Self {
            name,
            failure_threshold: params.failure_threshold,
            timeout: params.timeout,
            params,
            state: CircuitState::Closed,
            state_since: Instant::now(),
            epoch: 0,
            failure_count: 0,
            calls_since_close: 0,
            next_attempt_at: None,
            opened_at_system: None,
            last_probe_at: None,
            half_open_in_flight: 0,
            half_open_successes: 0,
            failures: 0,
            successes: 0,
            total_calls: 0,
            last_failure_time: None,
            last_success_time: None,
            last_error: None,
            window: ResultWindow::default(),
            results_since_adjustment: 0,
            transitions: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn params(&self) -> &CircuitBreakerParams {
        &self.params
    }

    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition> {
        self.transitions.iter()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.transitions.back()
    }

    /// Returns whether a call may *start* right now.
    ///
    /// An admitted half-open call occupies a probe slot until its result is
    /// recorded.
    pub fn can_execute(&mut self) -> bool {
        self.admit().is_some()
    }

    /// Admits a call and returns the epoch its result must be recorded
    /// against, or `None` when the circuit rejects it.
    pub fn admit(&mut self) -> Option<u64> {
        self.admits().then_some(self.epoch)
    }

    fn admits(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,

            CircuitState::Open => {
                let Some(next_attempt) = self.next_attempt_at else {
                    // Shouldn't happen, but failsafe: treat as open.
                    return false;
                };

                if Instant::now() >= next_attempt {
                    self.enter_half_open("timeout_elapsed");
                    // fall-through to half-open logic
                    self.admits()
                } else {
                    false
                }
            }

            CircuitState::HalfOpen => {
                if self.half_open_in_flight < self.params.half_open_max_calls {
                    self.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a result against the current state.
    pub fn record_result(&mut self, success: bool, duration: Duration, error: Option<&str>) {
        self.record_admitted(self.epoch, success, duration, error);
    }

    /// Records the result of a call admitted at `epoch`.
    ///
    /// A call admitted before the latest transition only feeds the statistics:
    /// it neither frees a probe slot nor moves the state machine.
    pub fn record_admitted(
        &mut self,
        epoch: u64,
        success: bool,
        duration: Duration,
        error: Option<&str>,
    ) {
        self.total_calls += 1;
        self.window
            .push(success, duration, self.params.slow_call_duration);

        if success {
            self.successes += 1;
            self.last_success_time = Some(Utc::now());
        } else {
            self.failures += 1;
            self.last_failure_time = Some(Utc::now());
            if let Some(error) = error {
                self.last_error = Some(error.to_string());
            }
        }

        if self.state == CircuitState::Closed {
            self.calls_since_close += 1;
        }

        if epoch != self.epoch {
            debug!(
                breaker = %self.name,
                admitted_epoch = epoch,
                epoch = self.epoch,
                "result of a call admitted before the last transition"
            );
            self.maybe_adapt();
            return;
        }

        match self.state {
            CircuitState::Closed => {
                if success {
                    // Soft decay: one success forgives one failure.
                    self.failure_count = self.failure_count.saturating_sub(1);
                } else {
                    self.failure_count = self.failure_count.saturating_add(1);
                }

                if let Some(reason) = self.open_reason() {
                    self.trip_open(reason);
                }
            }

            CircuitState::Open => {
                // Nothing is admitted while open.
            }

            CircuitState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);

                if success {
                    self.half_open_successes = self.half_open_successes.saturating_add(1);
                    if self.half_open_successes >= self.params.success_threshold {
                        self.reset_closed("success_threshold_reached");
                    }
                } else {
                    // Any failure while half-open immediately re-opens.
                    self.trip_open("half_open_failure");
                }
            }
        }

        self.maybe_adapt();
    }

    fn open_reason(&self) -> Option<&'static str> {
        if self.failure_count >= self.failure_threshold {
            return Some("failure_threshold_exceeded");
        }

        // Rates come from the window; volume counts every call since the
        // circuit last closed.
        if self.calls_since_close >= u64::from(self.params.volume_threshold) {
            if self.window.error_rate() >= self.params.error_rate_threshold {
                return Some("error_rate_exceeded");
            }
            if self.window.slow_call_rate() >= self.params.slow_call_rate_threshold {
                return Some("slow_call_rate_exceeded");
            }
        }

        None
    }

    fn maybe_adapt(&mut self) {
        let Some(adaptive) = &self.params.adaptive else {
            return;
        };

        self.results_since_adjustment += 1;
        if self.results_since_adjustment < adaptive.evaluation_interval {
            return;
        }
        self.results_since_adjustment = 0;

        let current = Thresholds {
            failure_threshold: self.failure_threshold,
            timeout: self.timeout,
        };
        let next = adaptive::adjust(
            adaptive,
            current,
            self.window.success_rate(),
            self.window.average_response_time(),
        );

        if next != current {
            debug!(
                event = "circuit_thresholds_adjusted",
                breaker = %self.name,
                failure_threshold = next.failure_threshold,
                timeout_ms = next.timeout.as_millis() as u64,
            );
            self.failure_threshold = next.failure_threshold;
            self.timeout = next.timeout;
        }
    }

    /// Whether an open breaker with a configured probe should be probed now.
    pub(crate) fn probe_due(&self, now: Instant) -> bool {
        let Some(interval) = self.params.probe_interval else {
            return false;
        };
        self.state == CircuitState::Open
            && self
                .last_probe_at
                .map(|last| now.duration_since(last) >= interval)
                .unwrap_or(true)
    }

    pub(crate) fn mark_probed(&mut self, now: Instant) {
        self.last_probe_at = Some(now);
    }

    /// A successful health probe skips the rest of the open window.
    pub(crate) fn probe_succeeded(&mut self) -> bool {
        if self.state != CircuitState::Open {
            return false;
        }
        self.enter_half_open("health_probe_succeeded");
        true
    }

    pub fn force_state(&mut self, state: CircuitState, reason: &str) {
        match state {
            CircuitState::Open => self.trip_open(reason),
            CircuitState::HalfOpen => self.enter_half_open(reason),
            CircuitState::Closed => self.reset_closed(reason),
        }
    }

    /// Back to a pristine closed breaker; the transition log is kept.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.successes = 0;
        self.total_calls = 0;
        self.last_failure_time = None;
        self.last_success_time = None;
        self.last_error = None;
        self.window.clear();
        self.results_since_adjustment = 0;
        self.calls_since_close = 0;
        self.failure_threshold = self.params.failure_threshold;
        self.timeout = self.params.timeout;

        if self.state == CircuitState::Closed {
            self.failure_count = 0;
            debug!(event = "circuit_reset", breaker = %self.name);
        } else {
            self.reset_closed("reset");
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            state: self.state,
            failures: self.failures,
            successes: self.successes,
            total_calls: self.total_calls,
            failure_count: self.failure_count,
            last_failure_time: self.last_failure_time,
            last_success_time: self.last_success_time,
            last_error: self.last_error.clone(),
            error_rate: self.window.error_rate(),
            slow_call_rate: self.window.slow_call_rate(),
            average_response_time: self.window.average_response_time(),
            time_in_current_state: self.state_since.elapsed(),
            failure_threshold: self.failure_threshold,
            timeout: self.timeout,
        }
    }

    pub(crate) fn window_len(&self) -> usize {
        self.window.len()
    }

    pub(crate) fn trip_open(&mut self, reason: &str) {
        let failures = self.failure_count;
        self.next_attempt_at = Some(Instant::now() + self.timeout);
        self.opened_at_system = Some(Utc::now());
        self.last_probe_at = None;
        self.failure_count = 0;
        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
        self.transition(CircuitState::Open, reason);

        debug!(
            breaker = %self.name,
            failures = failures,
            timeout_ms = self.timeout.as_millis() as u64,
            "circuit open window started"
        );
    }

    fn enter_half_open(&mut self, reason: &str) {
        self.next_attempt_at = None;
        self.opened_at_system = None;
        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
        self.transition(CircuitState::HalfOpen, reason);
    }

    fn reset_closed(&mut self, reason: &str) {
        self.window.clear();
        self.calls_since_close = 0;
        self.next_attempt_at = None;
        self.opened_at_system = None;
        self.failure_count = 0;
        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
        self.transition(CircuitState::Closed, reason);
    }

    fn transition(&mut self, to: CircuitState, reason: &str) {
        let from = self.state;
        self.state = to;
        self.state_since = Instant::now();
        self.epoch += 1;

        if self.transitions.len() == TRANSITION_LOG_SIZE {
            self.transitions.pop_front();
        }
        self.transitions.push_back(StateTransition {
            from,
            to,
            at: Utc::now(),
            reason: reason.to_string(),
        });

        info!(
            event = "circuit_transition",
            breaker = %self.name,
            from = ?from,
            to = ?to,
            reason = reason
        );
    }
}
