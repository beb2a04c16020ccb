use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Represents the whole `forgeflow.hcl` file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ForgeFlowConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults shared by every breaker.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-breaker overrides keyed by breaker name.
    #[serde(default)]
    pub breakers: BTreeMap<String, BreakerOverrideConfig>,

    #[serde(default)]
    pub health_monitor: HealthMonitorConfig,

    #[serde(default)]
    pub degradation: DegradationConfig,
}

//-----------------------------------------------------------------------------
// Logging
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set.
    #[serde(default = "log_default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Optional directory for a daily rolling log file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: log_default_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

fn log_default_level() -> String {
    "info".to_string()
}

//-----------------------------------------------------------------------------
// Circuit breakers
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Decaying failure count that opens the circuit.
    #[serde(default = "cb_default_failure_threshold")]
    pub failure_threshold: u32,

    /// Half-open successes required to close the circuit.
    #[serde(default = "cb_default_success_threshold")]
    pub success_threshold: u32,

    /// How long the circuit stays open before admitting a probe call.
    #[serde(default = "cb_default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "cb_default_half_open_max_calls")]
    pub half_open_max_calls: u32,

    #[serde(default = "cb_default_volume_threshold")]
    pub volume_threshold: u32,

    #[serde(default = "cb_default_error_rate_threshold")]
    pub error_rate_threshold: f64,

    #[serde(default = "cb_default_slow_call_rate_threshold")]
    pub slow_call_rate_threshold: f64,

    #[serde(default = "cb_default_slow_call_duration_ms")]
    pub slow_call_duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_interval_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<AdaptiveConfig>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: cb_default_failure_threshold(),
            success_threshold: cb_default_success_threshold(),
            timeout_ms: cb_default_timeout_ms(),
            half_open_max_calls: cb_default_half_open_max_calls(),
            volume_threshold: cb_default_volume_threshold(),
            error_rate_threshold: cb_default_error_rate_threshold(),
            slow_call_rate_threshold: cb_default_slow_call_rate_threshold(),
            slow_call_duration_ms: cb_default_slow_call_duration_ms(),
            probe_interval_ms: None,
            adaptive: None,
        }
    }
}

fn cb_default_failure_threshold() -> u32 {
    5
}
fn cb_default_success_threshold() -> u32 {
    2
}
fn cb_default_timeout_ms() -> u64 {
    60_000
}
fn cb_default_half_open_max_calls() -> u32 {
    1
}
fn cb_default_volume_threshold() -> u32 {
    10
}
fn cb_default_error_rate_threshold() -> f64 {
    0.5
}
fn cb_default_slow_call_rate_threshold() -> f64 {
    0.5
}
fn cb_default_slow_call_duration_ms() -> u64 {
    5_000
}

/// Every field falls back to the shared `circuit_breaker` defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BreakerOverrideConfig {
    pub failure_threshold: Option<u32>,
    pub success_threshold: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub half_open_max_calls: Option<u32>,
    pub volume_threshold: Option<u32>,
    pub error_rate_threshold: Option<f64>,
    pub slow_call_rate_threshold: Option<f64>,
    pub slow_call_duration_ms: Option<u64>,
    pub probe_interval_ms: Option<u64>,
    /// Replaces the shared adaptive settings as a whole.
    pub adaptive: Option<AdaptiveConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdaptiveConfig {
    #[serde(default = "ad_default_enabled")]
    pub enabled: bool,
    #[serde(default = "ad_default_min_failure_threshold")]
    pub min_failure_threshold: u32,
    #[serde(default = "ad_default_max_failure_threshold")]
    pub max_failure_threshold: u32,
    #[serde(default = "ad_default_min_timeout_ms")]
    pub min_timeout_ms: u64,
    #[serde(default = "ad_default_max_timeout_ms")]
    pub max_timeout_ms: u64,
    /// Recorded results between two adjustments.
    #[serde(default = "ad_default_evaluation_interval")]
    pub evaluation_interval: u32,
    #[serde(default = "ad_default_healthy_success_rate")]
    pub healthy_success_rate: f64,
    #[serde(default = "ad_default_unhealthy_success_rate")]
    pub unhealthy_success_rate: f64,
    #[serde(default = "ad_default_latency_target_ms")]
    pub latency_target_ms: u64,
    #[serde(default = "ad_default_relax_factor")]
    pub relax_factor: f64,
    #[serde(default = "ad_default_tighten_factor")]
    pub tighten_factor: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: ad_default_enabled(),
            min_failure_threshold: ad_default_min_failure_threshold(),
            max_failure_threshold: ad_default_max_failure_threshold(),
            min_timeout_ms: ad_default_min_timeout_ms(),
            max_timeout_ms: ad_default_max_timeout_ms(),
            evaluation_interval: ad_default_evaluation_interval(),
            healthy_success_rate: ad_default_healthy_success_rate(),
            unhealthy_success_rate: ad_default_unhealthy_success_rate(),
            latency_target_ms: ad_default_latency_target_ms(),
            relax_factor: ad_default_relax_factor(),
            tighten_factor: ad_default_tighten_factor(),
        }
    }
}

fn ad_default_enabled() -> bool {
    true
}
fn ad_default_min_failure_threshold() -> u32 {
    3
}
fn ad_default_max_failure_threshold() -> u32 {
    20
}
fn ad_default_min_timeout_ms() -> u64 {
    10_000
}
fn ad_default_max_timeout_ms() -> u64 {
    300_000
}
fn ad_default_evaluation_interval() -> u32 {
    20
}
fn ad_default_healthy_success_rate() -> f64 {
    0.95
}
fn ad_default_unhealthy_success_rate() -> f64 {
    0.8
}
fn ad_default_latency_target_ms() -> u64 {
    1_000
}
fn ad_default_relax_factor() -> f64 {
    1.25
}
fn ad_default_tighten_factor() -> f64 {
    0.8
}

//-----------------------------------------------------------------------------
// Health monitor
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthMonitorConfig {
    #[serde(default = "hm_default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound for a single component check.
    #[serde(default = "hm_default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    #[serde(default = "hm_default_history_size")]
    pub history_size: usize,

    #[serde(default = "hm_default_response_time_threshold_ms")]
    pub response_time_threshold_ms: u64,

    /// Sample memory, cpu, disk and network from the host.
    #[serde(default = "hm_default_resource_monitoring")]
    pub resource_monitoring: bool,

    #[serde(default = "hm_default_disk_path")]
    pub disk_path: PathBuf,

    #[serde(default = "hm_default_network_capacity")]
    pub network_capacity_bytes_per_sec: f64,

    /// Overall health reported when aggregation fails.
    #[serde(default = "hm_default_degraded_snapshot_health")]
    pub degraded_snapshot_health: f64,

    #[serde(default = "hm_default_snapshot_channel_capacity")]
    pub snapshot_channel_capacity: usize,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Weight and priority keyed by component name.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: hm_default_interval_ms(),
            check_timeout_ms: hm_default_check_timeout_ms(),
            history_size: hm_default_history_size(),
            response_time_threshold_ms: hm_default_response_time_threshold_ms(),
            resource_monitoring: hm_default_resource_monitoring(),
            disk_path: hm_default_disk_path(),
            network_capacity_bytes_per_sec: hm_default_network_capacity(),
            degraded_snapshot_health: hm_default_degraded_snapshot_health(),
            snapshot_channel_capacity: hm_default_snapshot_channel_capacity(),
            thresholds: ThresholdsConfig::default(),
            alerts: AlertsConfig::default(),
            components: BTreeMap::new(),
        }
    }
}

fn hm_default_interval_ms() -> u64 {
    30_000
}
fn hm_default_check_timeout_ms() -> u64 {
    5_000
}
fn hm_default_history_size() -> usize {
    100
}
fn hm_default_response_time_threshold_ms() -> u64 {
    1_000
}
fn hm_default_resource_monitoring() -> bool {
    true
}
fn hm_default_disk_path() -> PathBuf {
    PathBuf::from("/")
}
fn hm_default_network_capacity() -> f64 {
    // 1 Gbit/s
    125_000_000.0
}
fn hm_default_degraded_snapshot_health() -> f64 {
    30.0
}
fn hm_default_snapshot_channel_capacity() -> usize {
    16
}

/// Critical usage percent per resource; warning is 80% of critical.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThresholdsConfig {
    #[serde(default = "th_default_memory")]
    pub memory: f64,
    #[serde(default = "th_default_cpu")]
    pub cpu: f64,
    #[serde(default = "th_default_disk")]
    pub disk: f64,
    #[serde(default = "th_default_network")]
    pub network: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            memory: th_default_memory(),
            cpu: th_default_cpu(),
            disk: th_default_disk(),
            network: th_default_network(),
        }
    }
}

fn th_default_memory() -> f64 {
    90.0
}
fn th_default_cpu() -> f64 {
    90.0
}
fn th_default_disk() -> f64 {
    95.0
}
fn th_default_network() -> f64 {
    80.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertsConfig {
    /// "log" and/or "event".
    #[serde(default = "al_default_channels")]
    pub channels: Vec<String>,

    /// Per component and category.
    #[serde(default = "al_default_max_alerts_per_minute")]
    pub max_alerts_per_minute: u32,

    #[serde(default = "al_default_history_size")]
    pub history_size: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            channels: al_default_channels(),
            max_alerts_per_minute: al_default_max_alerts_per_minute(),
            history_size: al_default_history_size(),
        }
    }
}

fn al_default_channels() -> Vec<String> {
    vec!["log".to_string(), "event".to_string()]
}
fn al_default_max_alerts_per_minute() -> u32 {
    10
}
fn al_default_history_size() -> usize {
    500
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComponentConfig {
    #[serde(default = "cmp_default_weight")]
    pub weight: f64,

    /// "critical", "high", "medium" or "low".
    #[serde(default = "cmp_default_priority")]
    pub priority: String,
}

fn cmp_default_weight() -> f64 {
    1.0
}
fn cmp_default_priority() -> String {
    "medium".to_string()
}

//-----------------------------------------------------------------------------
// Degradation
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DegradationConfig {
    /// Interval of the dwell-time check.
    #[serde(default = "dg_default_evaluation_interval_ms")]
    pub evaluation_interval_ms: u64,

    #[serde(default = "dg_default_true")]
    pub auto_recovery: bool,

    #[serde(default = "dg_default_true")]
    pub auto_activate_strategies: bool,

    #[serde(default = "dg_default_history_size")]
    pub history_size: usize,

    #[serde(default)]
    pub emergency: EmergencyConfig,

    /// Replaces the built-in five-level table when non-empty.
    #[serde(default)]
    pub levels: Vec<LevelConfig>,

    /// Fallback strategies keyed by component name.
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategyConfig>,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_ms: dg_default_evaluation_interval_ms(),
            auto_recovery: true,
            auto_activate_strategies: true,
            history_size: dg_default_history_size(),
            emergency: EmergencyConfig::default(),
            levels: Vec::new(),
            strategies: BTreeMap::new(),
        }
    }
}

fn dg_default_evaluation_interval_ms() -> u64 {
    10_000
}
fn dg_default_true() -> bool {
    true
}
fn dg_default_history_size() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmergencyConfig {
    /// Overall health below which emergency mode is entered.
    #[serde(default = "em_default_trigger_health")]
    pub trigger_health: f64,

    /// Components never isolated in emergency mode.
    #[serde(default)]
    pub core_components: Vec<String>,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            trigger_health: em_default_trigger_health(),
            core_components: Vec::new(),
        }
    }
}

fn em_default_trigger_health() -> f64 {
    20.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LevelConfig {
    pub id: u8,
    pub name: String,
    pub min_health: f64,
    pub max_health: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,

    /// Missing classes are unlimited.
    #[serde(default)]
    pub failure_budget: FailureBudgetConfig,

    #[serde(default)]
    pub actions: Vec<LevelActionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FailureBudgetConfig {
    pub critical: Option<u32>,
    pub high: Option<u32>,
    pub medium: Option<u32>,
    pub low: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LevelActionConfig {
    ActivateFallback { component: String },
    IsolateComponent { component: String },
    ShedCapacity { percent: u8 },
    DisableFeature { feature: String },
    EnterEmergencyMode,
    RestartComponent { component: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Defaults to `<component>_fallback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "st_default_applicable_states")]
    pub applicable_states: Vec<String>,

    /// Expected throughput loss, 0.0-1.0.
    #[serde(default)]
    pub performance_impact: f64,

    #[serde(default)]
    pub functionality_lost: Vec<String>,

    #[serde(default = "dg_default_true")]
    pub reversible: bool,

    #[serde(default)]
    pub actions: Vec<FallbackActionConfig>,
}

fn st_default_applicable_states() -> Vec<String> {
    vec!["degraded".to_string(), "critical".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackActionConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub critical: bool,

    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}
