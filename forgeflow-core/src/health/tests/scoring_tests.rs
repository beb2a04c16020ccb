use crate::health::{
    ComponentStatus, MonitorError, ResourceStatus, component_score, overall_health, resource_score,
    weighted_component_score,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

const THRESHOLD: Duration = Duration::from_secs(1);

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn baseline_follows_status() {
    let scores: Vec<f64> = [
        ComponentStatus::Healthy,
        ComponentStatus::Degraded,
        ComponentStatus::Critical,
        ComponentStatus::Offline,
    ]
    .into_iter()
    .map(|s| component_score(s, None, THRESHOLD, 0.0, 0))
    .collect();

    assert_eq!(scores, vec![100.0, 70.0, 30.0, 0.0]);
}

#[test]
fn penalties_are_subtracted_from_baseline() {
    let score = component_score(
        ComponentStatus::Degraded,
        Some(Duration::from_millis(1500)),
        THRESHOLD,
        0.1,
        2,
    );

    // 70 - 5 (response time) - 10 (errors) - 4 (issues)
    assert!(approx(score, 51.0), "score was {score}");
}

#[test]
fn penalties_are_capped() {
    let score = component_score(
        ComponentStatus::Healthy,
        Some(Duration::from_secs(10)),
        THRESHOLD,
        0.9,
        25,
    );

    assert_eq!(score, 40.0);
}

#[test]
fn score_never_drops_below_zero() {
    let score = component_score(
        ComponentStatus::Offline,
        Some(Duration::from_secs(10)),
        THRESHOLD,
        1.0,
        5,
    );

    assert_eq!(score, 0.0);
}

#[test]
fn response_time_under_threshold_costs_nothing() {
    let score = component_score(
        ComponentStatus::Healthy,
        Some(Duration::from_millis(999)),
        THRESHOLD,
        0.0,
        0,
    );

    assert_eq!(score, 100.0);
}

#[test]
fn resource_status_maps_to_fixed_scores() {
    assert_eq!(resource_score(ResourceStatus::Normal), 100.0);
    assert_eq!(resource_score(ResourceStatus::Warning), 70.0);
    assert_eq!(resource_score(ResourceStatus::Critical), 30.0);
}

#[test]
fn components_are_weighted_by_configured_weight() {
    let score = weighted_component_score(&[(0.0, 50.0), (100.0, 50.0)]);

    assert_eq!(score, Some(50.0));
}

#[test]
fn zero_weights_fall_back_to_equal_weighting() {
    let score = weighted_component_score(&[(20.0, 0.0), (80.0, 0.0), (50.0, 0.0)]);

    assert_eq!(score, Some(50.0));
}

#[test]
fn overall_renormalises_over_present_blocks() {
    let components_only = overall_health(Some(50.0), None, None).unwrap();
    assert!(approx(components_only, 50.0), "was {components_only}");

    let with_resources = overall_health(Some(100.0), Some(50.0), None).unwrap();
    // (100 * 0.6 + 50 * 0.2) / 0.8
    assert!(approx(with_resources, 87.5), "was {with_resources}");

    let all = overall_health(Some(100.0), Some(100.0), Some(0.0)).unwrap();
    assert!(approx(all, 80.0), "was {all}");
}

#[test]
fn overall_without_any_data_is_fully_healthy() {
    assert_eq!(overall_health(None, None, None), Ok(100.0));
}

#[test]
fn non_finite_block_is_an_aggregation_error() {
    let result = overall_health(Some(f64::NAN), None, None);

    assert_eq!(
        result,
        Err(MonitorError::NonFiniteScore {
            block: "components"
        })
    );
}
