use crate::conf::error::{ConfigError, ValidationCtx, ValidationErrors};
use crate::conf::lower::{lower_breaker, lower_breaker_override, lower_degradation, lower_health_monitor};
use crate::conf::types::{DegradationConfig, ForgeFlowConfig, HealthMonitorConfig, LevelActionConfig};
use tracing_subscriber::EnvFilter;

/// Checks every semantic rule and reports all violations at once.
pub fn validate_config(cfg: &ForgeFlowConfig) -> Result<(), ValidationErrors> {
    let mut ctx = ValidationCtx::default();

    if EnvFilter::try_new(&cfg.logging.level).is_err() {
        ctx.push(ConfigError::InvalidLogLevel {
            level: cfg.logging.level.clone(),
        });
    }

    validate_breakers(cfg, &mut ctx);
    validate_health_monitor(&cfg.health_monitor, &mut ctx);
    validate_degradation(&cfg.degradation, &mut ctx);

    ctx.into_result()
}

fn validate_breakers(cfg: &ForgeFlowConfig, ctx: &mut ValidationCtx) {
    let defaults = lower_breaker(&cfg.circuit_breaker);
    if let Err(e) = defaults.validate("circuit_breaker") {
        ctx.push(ConfigError::InvalidCircuitBreaker {
            breaker: "circuit_breaker".to_string(),
            reason: e.to_string(),
        });
    }

    for (name, o) in &cfg.breakers {
        if let Err(e) = lower_breaker_override(&defaults, o).validate(name) {
            ctx.push(ConfigError::InvalidCircuitBreaker {
                breaker: name.clone(),
                reason: e.to_string(),
            });
        }
    }
}

fn validate_health_monitor(cfg: &HealthMonitorConfig, ctx: &mut ValidationCtx) {
    let positive = [
        ("interval_ms", cfg.interval_ms),
        ("check_timeout_ms", cfg.check_timeout_ms),
        ("response_time_threshold_ms", cfg.response_time_threshold_ms),
        ("history_size", cfg.history_size as u64),
        ("snapshot_channel_capacity", cfg.snapshot_channel_capacity as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            ctx.push(ConfigError::InvalidMonitor {
                field,
                reason: "must be greater than zero".to_string(),
            });
        }
    }

    if !(0.0..=100.0).contains(&cfg.degraded_snapshot_health) {
        ctx.push(ConfigError::InvalidMonitor {
            field: "degraded_snapshot_health",
            reason: "must be within [0, 100]".to_string(),
        });
    }
    if cfg.resource_monitoring && !(cfg.network_capacity_bytes_per_sec > 0.0) {
        ctx.push(ConfigError::InvalidMonitor {
            field: "network_capacity_bytes_per_sec",
            reason: "must be greater than zero".to_string(),
        });
    }

    let thresholds = [
        ("memory", cfg.thresholds.memory),
        ("cpu", cfg.thresholds.cpu),
        ("disk", cfg.thresholds.disk),
        ("network", cfg.thresholds.network),
    ];
    for (resource, value) in thresholds {
        if !(value > 0.0 && value <= 100.0) {
            ctx.push(ConfigError::InvalidThreshold { resource, value });
        }
    }

    if cfg.alerts.max_alerts_per_minute == 0 {
        ctx.push(ConfigError::InvalidMonitor {
            field: "alerts.max_alerts_per_minute",
            reason: "must be greater than zero".to_string(),
        });
    }

    for (name, c) in &cfg.components {
        if !(c.weight.is_finite() && c.weight >= 0.0) {
            ctx.push(ConfigError::InvalidComponent {
                component: name.clone(),
                reason: format!("weight {} must be a non-negative number", c.weight),
            });
        }
    }

    // Channel and priority spellings surface through lowering.
    if let Err(e) = lower_health_monitor(cfg) {
        ctx.push(e);
    }
}

fn validate_degradation(cfg: &DegradationConfig, ctx: &mut ValidationCtx) {
    if cfg.evaluation_interval_ms == 0 {
        ctx.push(ConfigError::InvalidDegradation {
            field: "evaluation_interval_ms",
            reason: "must be greater than zero".to_string(),
        });
    }
    if cfg.history_size == 0 {
        ctx.push(ConfigError::InvalidDegradation {
            field: "history_size",
            reason: "must be greater than zero".to_string(),
        });
    }
    if !(0.0..=100.0).contains(&cfg.emergency.trigger_health) {
        ctx.push(ConfigError::InvalidDegradation {
            field: "emergency.trigger_health",
            reason: "must be within [0, 100]".to_string(),
        });
    }

    for level in &cfg.levels {
        for action in &level.actions {
            if let LevelActionConfig::ShedCapacity { percent } = action
                && *percent > 100
            {
                ctx.push(ConfigError::InvalidLevels {
                    reason: format!("level {} sheds {percent}% capacity", level.id),
                });
            }
        }
    }

    for (component, s) in &cfg.strategies {
        if s.actions.is_empty() {
            ctx.push(ConfigError::EmptyStrategy {
                component: component.clone(),
            });
        }
        if !(0.0..=1.0).contains(&s.performance_impact) {
            ctx.push(ConfigError::InvalidStrategy {
                component: component.clone(),
                reason: "performance_impact must be within [0, 1]".to_string(),
            });
        }
    }

    // Level table shape and strategy spellings surface through lowering.
    if let Err(e) = lower_degradation(cfg) {
        ctx.push(e);
    }
}
