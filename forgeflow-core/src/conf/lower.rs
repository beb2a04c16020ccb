use crate::circuit_breaker::{AdaptiveParams, CircuitBreakerParams};
use crate::conf::error::ConfigError;
use crate::conf::types::{
    AdaptiveConfig, BreakerOverrideConfig, CircuitBreakerConfig, DegradationConfig,
    FailureBudgetConfig, FallbackActionConfig, ForgeFlowConfig, HealthMonitorConfig,
    LevelActionConfig, LevelConfig, StrategyConfig, ThresholdsConfig,
};
use crate::degradation::{
    DegradationError, DegradationLevel, DegradationParams, FailureBudget, FallbackAction, FallbackActionKind,
    FallbackStrategy, LevelAction, LevelTable,
};
use crate::health::{
    AlertChannel, AlertParams, ComponentPriority, ComponentSettings, ComponentStatus,
    HealthMonitorParams, ResourceThresholds,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the control plane needs, lowered from the file.
#[derive(Debug, Clone)]
pub struct RuntimeParams {
    pub breaker_defaults: CircuitBreakerParams,
    pub breaker_overrides: HashMap<String, CircuitBreakerParams>,
    pub monitor: HealthMonitorParams,
    /// `None` when host resource sampling is disabled.
    pub resources: Option<ResourceSamplingParams>,
    pub degradation: DegradationParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSamplingParams {
    pub disk_path: PathBuf,
    pub network_capacity_bytes_per_sec: f64,
}

pub fn lower_config(cfg: &ForgeFlowConfig) -> Result<RuntimeParams, ConfigError> {
    let breaker_defaults = lower_breaker(&cfg.circuit_breaker);
    let breaker_overrides = cfg
        .breakers
        .iter()
        .map(|(name, o)| (name.clone(), lower_breaker_override(&breaker_defaults, o)))
        .collect();

    let resources = cfg
        .health_monitor
        .resource_monitoring
        .then(|| ResourceSamplingParams {
            disk_path: cfg.health_monitor.disk_path.clone(),
            network_capacity_bytes_per_sec: cfg.health_monitor.network_capacity_bytes_per_sec,
        });

    Ok(RuntimeParams {
        breaker_defaults,
        breaker_overrides,
        monitor: lower_health_monitor(&cfg.health_monitor)?,
        resources,
        degradation: lower_degradation(&cfg.degradation)?,
    })
}

//-----------------------------------------------------------------------------
// Circuit breakers
//-----------------------------------------------------------------------------

pub fn lower_breaker(cfg: &CircuitBreakerConfig) -> CircuitBreakerParams {
    CircuitBreakerParams {
        failure_threshold: cfg.failure_threshold,
        success_threshold: cfg.success_threshold,
        timeout: Duration::from_millis(cfg.timeout_ms),
        half_open_max_calls: cfg.half_open_max_calls,
        volume_threshold: cfg.volume_threshold,
        error_rate_threshold: cfg.error_rate_threshold,
        slow_call_rate_threshold: cfg.slow_call_rate_threshold,
        slow_call_duration: Duration::from_millis(cfg.slow_call_duration_ms),
        probe_interval: cfg.probe_interval_ms.map(Duration::from_millis),
        adaptive: cfg.adaptive.as_ref().and_then(lower_adaptive),
    }
}

pub fn lower_breaker_override(
    base: &CircuitBreakerParams,
    o: &BreakerOverrideConfig,
) -> CircuitBreakerParams {
    CircuitBreakerParams {
        failure_threshold: o.failure_threshold.unwrap_or(base.failure_threshold),
        success_threshold: o.success_threshold.unwrap_or(base.success_threshold),
        timeout: o
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(base.timeout),
        half_open_max_calls: o.half_open_max_calls.unwrap_or(base.half_open_max_calls),
        volume_threshold: o.volume_threshold.unwrap_or(base.volume_threshold),
        error_rate_threshold: o.error_rate_threshold.unwrap_or(base.error_rate_threshold),
        slow_call_rate_threshold: o
            .slow_call_rate_threshold
            .unwrap_or(base.slow_call_rate_threshold),
        slow_call_duration: o
            .slow_call_duration_ms
            .map(Duration::from_millis)
            .unwrap_or(base.slow_call_duration),
        probe_interval: o
            .probe_interval_ms
            .map(Duration::from_millis)
            .or(base.probe_interval),
        adaptive: match &o.adaptive {
            Some(adaptive) => lower_adaptive(adaptive),
            None => base.adaptive.clone(),
        },
    }
}

fn lower_adaptive(cfg: &AdaptiveConfig) -> Option<AdaptiveParams> {
    cfg.enabled.then(|| AdaptiveParams {
        min_failure_threshold: cfg.min_failure_threshold,
        max_failure_threshold: cfg.max_failure_threshold,
        min_timeout: Duration::from_millis(cfg.min_timeout_ms),
        max_timeout: Duration::from_millis(cfg.max_timeout_ms),
        evaluation_interval: cfg.evaluation_interval,
        healthy_success_rate: cfg.healthy_success_rate,
        unhealthy_success_rate: cfg.unhealthy_success_rate,
        latency_target: Duration::from_millis(cfg.latency_target_ms),
        relax_factor: cfg.relax_factor,
        tighten_factor: cfg.tighten_factor,
    })
}

//-----------------------------------------------------------------------------
// Health monitor
//-----------------------------------------------------------------------------

pub fn lower_health_monitor(cfg: &HealthMonitorConfig) -> Result<HealthMonitorParams, ConfigError> {
    let channels = cfg
        .alerts
        .channels
        .iter()
        .map(|c| {
            c.parse::<AlertChannel>()
                .map_err(|_| ConfigError::InvalidAlertChannel { channel: c.clone() })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let components = cfg
        .components
        .iter()
        .map(|(name, c)| {
            let priority = c.priority.parse::<ComponentPriority>().map_err(|reason| {
                ConfigError::InvalidComponent {
                    component: name.clone(),
                    reason,
                }
            })?;
            Ok((
                name.clone(),
                ComponentSettings {
                    weight: c.weight,
                    priority,
                },
            ))
        })
        .collect::<Result<HashMap<_, _>, ConfigError>>()?;

    Ok(HealthMonitorParams {
        interval: Duration::from_millis(cfg.interval_ms),
        check_timeout: Duration::from_millis(cfg.check_timeout_ms),
        history_size: cfg.history_size,
        response_time_threshold: Duration::from_millis(cfg.response_time_threshold_ms),
        degraded_snapshot_health: cfg.degraded_snapshot_health,
        snapshot_channel_capacity: cfg.snapshot_channel_capacity,
        thresholds: lower_thresholds(&cfg.thresholds),
        alerts: AlertParams {
            channels,
            max_alerts_per_minute: cfg.alerts.max_alerts_per_minute,
            history_size: cfg.alerts.history_size,
        },
        components,
    })
}

fn lower_thresholds(cfg: &ThresholdsConfig) -> ResourceThresholds {
    ResourceThresholds {
        memory: cfg.memory,
        cpu: cfg.cpu,
        disk: cfg.disk,
        network: cfg.network,
    }
}

//-----------------------------------------------------------------------------
// Degradation
//-----------------------------------------------------------------------------

pub fn lower_degradation(cfg: &DegradationConfig) -> Result<DegradationParams, ConfigError> {
    let levels = if cfg.levels.is_empty() {
        LevelTable::default()
    } else {
        LevelTable::new(cfg.levels.iter().map(lower_level).collect()).map_err(|e| match e {
            DegradationError::InvalidLevels { reason } => ConfigError::InvalidLevels { reason },
            other => ConfigError::InvalidLevels {
                reason: other.to_string(),
            },
        })?
    };

    let strategies = cfg
        .strategies
        .iter()
        .map(|(component, s)| Ok((component.clone(), lower_strategy(component, s)?)))
        .collect::<Result<HashMap<_, _>, ConfigError>>()?;

    Ok(DegradationParams {
        evaluation_interval: Duration::from_millis(cfg.evaluation_interval_ms),
        auto_recovery: cfg.auto_recovery,
        auto_activate_strategies: cfg.auto_activate_strategies,
        history_size: cfg.history_size,
        emergency_trigger_health: cfg.emergency.trigger_health,
        core_components: cfg.emergency.core_components.iter().cloned().collect(),
        levels,
        strategies,
    })
}

fn lower_level(cfg: &LevelConfig) -> DegradationLevel {
    DegradationLevel {
        id: cfg.id,
        name: cfg.name.clone(),
        min_health: cfg.min_health,
        max_health: cfg.max_health,
        max_duration: cfg.max_duration_ms.map(Duration::from_millis),
        notification: cfg.notification.clone(),
        failure_budget: lower_budget(&cfg.failure_budget),
        actions: cfg.actions.iter().map(lower_level_action).collect(),
    }
}

fn lower_budget(cfg: &FailureBudgetConfig) -> FailureBudget {
    FailureBudget {
        critical: cfg.critical.unwrap_or(u32::MAX),
        high: cfg.high.unwrap_or(u32::MAX),
        medium: cfg.medium.unwrap_or(u32::MAX),
        low: cfg.low.unwrap_or(u32::MAX),
    }
}

fn lower_level_action(cfg: &LevelActionConfig) -> LevelAction {
    match cfg {
        LevelActionConfig::ActivateFallback { component } => LevelAction::ActivateFallback {
            component: component.clone(),
        },
        LevelActionConfig::IsolateComponent { component } => LevelAction::IsolateComponent {
            component: component.clone(),
        },
        LevelActionConfig::ShedCapacity { percent } => LevelAction::ShedCapacity { percent: *percent },
        LevelActionConfig::DisableFeature { feature } => LevelAction::DisableFeature {
            feature: feature.clone(),
        },
        LevelActionConfig::EnterEmergencyMode => LevelAction::EnterEmergencyMode,
        LevelActionConfig::RestartComponent { component } => LevelAction::RestartComponent {
            component: component.clone(),
        },
    }
}

fn lower_strategy(component: &str, cfg: &StrategyConfig) -> Result<FallbackStrategy, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidStrategy {
        component: component.to_string(),
        reason,
    };

    let applicable_states = cfg
        .applicable_states
        .iter()
        .map(|s| s.parse::<ComponentStatus>().map_err(invalid))
        .collect::<Result<Vec<_>, _>>()?;

    let actions = cfg
        .actions
        .iter()
        .map(|a| lower_fallback_action(a).map_err(invalid))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FallbackStrategy {
        component: component.to_string(),
        name: cfg
            .name
            .clone()
            .unwrap_or_else(|| format!("{component}_fallback")),
        applicable_states,
        actions,
        performance_impact: cfg.performance_impact,
        functionality_lost: cfg.functionality_lost.clone(),
        reversible: cfg.reversible,
    })
}

fn lower_fallback_action(cfg: &FallbackActionConfig) -> Result<FallbackAction, String> {
    let kind = cfg.kind.parse::<FallbackActionKind>()?;
    Ok(FallbackAction {
        kind,
        target: cfg.target.clone(),
        critical: cfg.critical,
        settings: cfg.settings.clone(),
    })
}
