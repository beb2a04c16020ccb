use crate::health::component::ComponentStatus;
use crate::health::resources::ResourceStatus;
use crate::health::snapshot::MonitorError;
use std::time::Duration;

/// Block weights of the overall score. Blocks without data are left out and
/// the remaining weights renormalised.
pub const COMPONENT_BLOCK_WEIGHT: f64 = 0.6;
pub const RESOURCE_BLOCK_WEIGHT: f64 = 0.2;
pub const INTEGRITY_BLOCK_WEIGHT: f64 = 0.2;

const MAX_RESPONSE_TIME_PENALTY: f64 = 20.0;
const MAX_ERROR_RATE_PENALTY: f64 = 30.0;
const MAX_ISSUE_PENALTY: f64 = 10.0;
const PER_ISSUE_PENALTY: f64 = 2.0;

pub fn component_score(
    status: ComponentStatus,
    response_time: Option<Duration>,
    response_time_threshold: Duration,
    error_rate: f64,
    open_issues: usize,
) -> f64 {
    let mut score = status.baseline();

    if let Some(rt) = response_time
        && !response_time_threshold.is_zero()
        && rt > response_time_threshold
    {
        let threshold = response_time_threshold.as_secs_f64();
        let over = (rt.as_secs_f64() - threshold) / threshold;
        score -= (10.0 * over).min(MAX_RESPONSE_TIME_PENALTY);
    }

    score -= (100.0 * error_rate.max(0.0)).min(MAX_ERROR_RATE_PENALTY);
    score -= (PER_ISSUE_PENALTY * open_issues as f64).min(MAX_ISSUE_PENALTY);

    score.clamp(0.0, 100.0)
}

pub fn resource_score(status: ResourceStatus) -> f64 {
    match status {
        ResourceStatus::Normal => 100.0,
        ResourceStatus::Warning => 70.0,
        ResourceStatus::Critical => 30.0,
    }
}

/// Weighted mean of `(score, weight)` pairs. Falls back to equal weighting
/// when no component carries a positive weight.
pub fn weighted_component_score(components: &[(f64, f64)]) -> Option<f64> {
    if components.is_empty() {
        return None;
    }

    let total_weight: f64 = components.iter().map(|(_, w)| w.max(0.0)).sum();
    if total_weight > 0.0 {
        let sum: f64 = components.iter().map(|(s, w)| s * w.max(0.0)).sum();
        Some(sum / total_weight)
    } else {
        let sum: f64 = components.iter().map(|(s, _)| s).sum();
        Some(sum / components.len() as f64)
    }
}

/// Overall 0-100 health from the three blocks.
pub fn overall_health(
    components: Option<f64>,
    resources: Option<f64>,
    integrity: Option<f64>,
) -> Result<f64, MonitorError> {
    let blocks = [
        ("components", components, COMPONENT_BLOCK_WEIGHT),
        ("resources", resources, RESOURCE_BLOCK_WEIGHT),
        ("integrity", integrity, INTEGRITY_BLOCK_WEIGHT),
    ];

    let mut weighted = 0.0;
    let mut weights = 0.0;
    for (block, score, weight) in blocks {
        let Some(score) = score else {
            continue;
        };
        if !score.is_finite() {
            return Err(MonitorError::NonFiniteScore { block });
        }
        weighted += score * weight;
        weights += weight;
    }

    // Nothing registered and nothing sampled: nothing is failing either.
    if weights == 0.0 {
        return Ok(100.0);
    }

    Ok((weighted / weights).clamp(0.0, 100.0))
}
