use crate::circuit_breaker::params::MIN_TIMEOUT;
use std::time::Duration;

/// Bounds and multipliers for self-tuning breakers.
///
/// Every `evaluation_interval` recorded results the breaker looks at its
/// recent success rate and latency. Healthy operations get a more tolerant
/// failure threshold and a shorter open window, struggling ones the reverse.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveParams {
    pub min_failure_threshold: u32,
    pub max_failure_threshold: u32,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
    pub evaluation_interval: u32,
    pub healthy_success_rate: f64,
    pub unhealthy_success_rate: f64,
    pub latency_target: Duration,
    pub relax_factor: f64,
    pub tighten_factor: f64,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            min_failure_threshold: 3,
            max_failure_threshold: 20,
            min_timeout: Duration::from_secs(10),
            max_timeout: Duration::from_secs(300),
            evaluation_interval: 20,
            healthy_success_rate: 0.95,
            unhealthy_success_rate: 0.8,
            latency_target: Duration::from_secs(1),
            relax_factor: 1.25,
            tighten_factor: 0.8,
        }
    }
}

impl AdaptiveParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_failure_threshold == 0 {
            return Err("adaptive.min_failure_threshold must be greater than zero".into());
        }
        if self.min_failure_threshold > self.max_failure_threshold {
            return Err("adaptive.min_failure_threshold exceeds max_failure_threshold".into());
        }
        if self.min_timeout < MIN_TIMEOUT {
            return Err("adaptive.min_timeout must be at least 1000ms".into());
        }
        if self.min_timeout > self.max_timeout {
            return Err("adaptive.min_timeout exceeds max_timeout".into());
        }
        if self.evaluation_interval == 0 {
            return Err("adaptive.evaluation_interval must be greater than zero".into());
        }
        if self.unhealthy_success_rate > self.healthy_success_rate {
            return Err("adaptive.unhealthy_success_rate exceeds healthy_success_rate".into());
        }
        if self.relax_factor <= 1.0 {
            return Err("adaptive.relax_factor must be greater than 1".into());
        }
        if !(self.tighten_factor > 0.0 && self.tighten_factor < 1.0) {
            return Err("adaptive.tighten_factor must be within (0, 1)".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Thresholds {
    pub failure_threshold: u32,
    pub timeout: Duration,
}

/// Computes the next thresholds from the recent window.
pub(crate) fn adjust(
    p: &AdaptiveParams,
    current: Thresholds,
    success_rate: f64,
    average_latency: Duration,
) -> Thresholds {
    let healthy = success_rate >= p.healthy_success_rate && average_latency <= p.latency_target;
    let unhealthy =
        success_rate < p.unhealthy_success_rate || average_latency > p.latency_target * 2;

    let (ft, timeout) = if healthy {
        (
            (current.failure_threshold as f64 * p.relax_factor).ceil(),
            current.timeout.mul_f64(p.tighten_factor),
        )
    } else if unhealthy {
        (
            (current.failure_threshold as f64 * p.tighten_factor).floor(),
            current.timeout.mul_f64(p.relax_factor),
        )
    } else {
        return current;
    };

    Thresholds {
        failure_threshold: (ft as u32).clamp(p.min_failure_threshold, p.max_failure_threshold),
        timeout: timeout.clamp(p.min_timeout, p.max_timeout),
    }
}
