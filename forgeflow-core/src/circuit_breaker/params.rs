use crate::circuit_breaker::adaptive::AdaptiveParams;
use crate::circuit_breaker::error::BreakerError;
use std::time::Duration;

/// Shortest open window a breaker may be configured with.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerParams {
    /// Decaying failure count that opens a closed circuit.
    pub failure_threshold: u32,
    /// Half-open successes required to close the circuit again.
    pub success_threshold: u32,
    /// How long the circuit stays open before a probe call is admitted.
    pub timeout: Duration,
    pub half_open_max_calls: u32,
    /// Calls required before rate based opening is considered.
    pub volume_threshold: u32,
    pub error_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration: Duration,
    /// Interval of the optional health probe while open.
    pub probe_interval: Option<Duration>,
    pub adaptive: Option<AdaptiveParams>,
}

impl Default for CircuitBreakerParams {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
            volume_threshold: 10,
            error_rate_threshold: 0.5,
            slow_call_rate_threshold: 0.5,
            slow_call_duration: Duration::from_secs(5),
            probe_interval: None,
            adaptive: None,
        }
    }
}

impl CircuitBreakerParams {
    pub fn validate(&self, name: &str) -> Result<(), BreakerError> {
        let invalid = |reason: &str| {
            Err(BreakerError::InvalidConfig {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.failure_threshold == 0 {
            return invalid("failure_threshold must be greater than zero");
        }
        if self.success_threshold == 0 {
            return invalid("success_threshold must be greater than zero");
        }
        if self.half_open_max_calls == 0 {
            return invalid("half_open_max_calls must be greater than zero");
        }
        if self.volume_threshold == 0 {
            return invalid("volume_threshold must be greater than zero");
        }
        if self.timeout < MIN_TIMEOUT {
            return invalid("timeout must be at least 1000ms");
        }
        if !(self.error_rate_threshold > 0.0 && self.error_rate_threshold <= 1.0) {
            return invalid("error_rate_threshold must be within (0, 1]");
        }
        if !(self.slow_call_rate_threshold > 0.0 && self.slow_call_rate_threshold <= 1.0) {
            return invalid("slow_call_rate_threshold must be within (0, 1]");
        }
        if self.slow_call_duration.is_zero() {
            return invalid("slow_call_duration must be greater than zero");
        }
        if let Some(interval) = self.probe_interval
            && interval.is_zero()
        {
            return invalid("probe_interval must be greater than zero");
        }
        if let Some(adaptive) = &self.adaptive {
            adaptive
                .validate()
                .map_err(|reason| BreakerError::InvalidConfig {
                    name: name.to_string(),
                    reason,
                })?;
        }

        Ok(())
    }
}
