use crate::circuit_breaker::breaker::{CircuitBreaker, CircuitState, StateTransition};
use crate::circuit_breaker::params::CircuitBreakerParams;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AdminBreakerView {
    pub name: String,
    pub state: CircuitState,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub error_rate: f64,
    pub slow_call_rate: f64,
    pub average_response_time_ms: f64,
    pub time_in_state_ms: u64,
    pub params: Option<CircuitBreakerParamsView>,
    pub details: Option<CircuitBreakerDetailsView>,
}

#[derive(Debug, Serialize)]
pub struct CircuitBreakerParamsView {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_milliseconds: u64,
    pub half_open_max_calls: u32,
    pub volume_threshold: u32,
    pub error_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_milliseconds: u64,
    pub probe_interval_milliseconds: Option<u64>,
    pub adaptive: bool,
}

impl From<&CircuitBreakerParams> for CircuitBreakerParamsView {
    fn from(p: &CircuitBreakerParams) -> Self {
        Self {
            failure_threshold: p.failure_threshold,
            success_threshold: p.success_threshold,
            timeout_milliseconds: p.timeout.as_millis() as u64,
            half_open_max_calls: p.half_open_max_calls,
            volume_threshold: p.volume_threshold,
            error_rate_threshold: p.error_rate_threshold,
            slow_call_rate_threshold: p.slow_call_rate_threshold,
            slow_call_duration_milliseconds: p.slow_call_duration.as_millis() as u64,
            probe_interval_milliseconds: p.probe_interval.map(|d| d.as_millis() as u64),
            adaptive: p.adaptive.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CircuitBreakerDetailsView {
    pub failure_count: u32,
    pub effective_failure_threshold: u32,
    pub effective_timeout_milliseconds: u64,
    pub opened_at_rfc3339: Option<String>,
    pub half_open_in_flight: u32,
    pub half_open_successes: u32,
    pub window_size: usize,
    pub last_error: Option<String>,
    pub transitions: Vec<StateTransition>,
}

impl AdminBreakerView {
    pub fn from_breaker(b: &CircuitBreaker, include_details: bool) -> Self {
        let m = b.metrics();

        let (params, details) = if include_details {
            (
                Some(CircuitBreakerParamsView::from(b.params())),
                Some(CircuitBreakerDetailsView {
                    failure_count: b.failure_count,
                    effective_failure_threshold: m.failure_threshold,
                    effective_timeout_milliseconds: m.timeout.as_millis() as u64,
                    opened_at_rfc3339: b.opened_at_system.map(|t| t.to_rfc3339()),
                    half_open_in_flight: b.half_open_in_flight,
                    half_open_successes: b.half_open_successes,
                    window_size: b.window_len(),
                    last_error: m.last_error.clone(),
                    transitions: b.transitions().cloned().collect(),
                }),
            )
        } else {
            (None, None)
        };

        Self {
            name: b.name().to_string(),
            state: m.state,
            total_calls: m.total_calls,
            total_successes: m.successes,
            total_failures: m.failures,
            error_rate: m.error_rate,
            slow_call_rate: m.slow_call_rate,
            average_response_time_ms: m.average_response_time.as_secs_f64() * 1000.0,
            time_in_state_ms: m.time_in_current_state.as_millis() as u64,
            params,
            details,
        }
    }
}
