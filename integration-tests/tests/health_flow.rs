use forgeflow_core::health::{
    ComponentPriority, ComponentSettings, ComponentStatus, ResourceKind, ResourceSample,
};
use forgeflow_core::{ControlPlane, ControlPlaneEvent};
use integration_tests::harness::{FixedSampler, ScriptedComponent};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn settings(weight: f64) -> ComponentSettings {
    ComponentSettings {
        weight,
        priority: ComponentPriority::Medium,
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[tokio::test]
async fn equal_weights_of_offline_and_healthy_score_fifty() {
    // Arrange
    let plane = ControlPlane::builder()
        .component_with("queue", ScriptedComponent::new(ComponentStatus::Offline), settings(50.0))
        .component_with("api", ScriptedComponent::healthy(), settings(50.0))
        .build()
        .unwrap();

    // Act
    let snapshot = plane.monitor().perform_health_check().await.unwrap();

    // Assert
    assert_close(snapshot.overall_health, 50.0);
    assert_eq!(snapshot.components["queue"].score, 0.0);
    assert_eq!(snapshot.components["api"].score, 100.0);
    assert!(snapshot.resources.is_empty());
    assert!(snapshot.integrity.is_none());
}

#[tokio::test]
async fn resource_block_is_weighted_in_when_sampled() {
    // Arrange
    let sample = ResourceSample::default()
        .with(ResourceKind::Memory, 40.0, 100.0)
        .with(ResourceKind::Disk, 10.0, 100.0);
    let plane = ControlPlane::builder()
        .component_with("queue", ScriptedComponent::new(ComponentStatus::Offline), settings(50.0))
        .component_with("api", ScriptedComponent::healthy(), settings(50.0))
        .resource_sampler(Arc::new(FixedSampler(sample)))
        .build()
        .unwrap();

    // Act
    let snapshot = plane.monitor().perform_health_check().await.unwrap();

    // Assert
    assert_eq!(snapshot.resources.len(), 2);
    // (50 * 0.6 + 100 * 0.2) / 0.8
    assert_close(snapshot.overall_health, 62.5);
}

#[tokio::test]
async fn repeated_checks_of_unchanged_inputs_score_identically() {
    // Arrange
    let plane = ControlPlane::builder()
        .component_with("queue", ScriptedComponent::new(ComponentStatus::Degraded), settings(3.0))
        .component_with("api", ScriptedComponent::healthy(), settings(1.0))
        .resource_sampler(Arc::new(FixedSampler(
            ResourceSample::default().with(ResourceKind::Memory, 90.0, 100.0),
        )))
        .build()
        .unwrap();

    // Act
    let first = plane.monitor().perform_health_check().await.unwrap();
    let second = plane.monitor().perform_health_check().await.unwrap();

    // Assert
    assert_eq!(
        first.overall_health.to_bits(),
        second.overall_health.to_bits()
    );
    assert_eq!(second.sequence, first.sequence + 1);
}

#[tokio::test]
async fn failing_check_raises_alert_until_component_recovers() {
    // Arrange
    let search = ScriptedComponent::healthy();
    let plane = ControlPlane::builder()
        .component("search", search.clone())
        .build()
        .unwrap();
    let mut events = plane.events().subscribe();
    search.fail("index unavailable");

    // Act
    let failed = plane.monitor().perform_health_check().await.unwrap();

    // Assert
    assert_eq!(failed.components["search"].status, ComponentStatus::Critical);
    assert_eq!(failed.components["search"].score, 0.0);
    assert_eq!(plane.monitor().active_alerts().len(), 1);
    let created = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, ControlPlaneEvent::AlertCreated { .. }))
        .count();
    assert_eq!(created, 1);

    // Arrange
    search.set_status(ComponentStatus::Healthy);

    // Act
    let recovered = plane.monitor().perform_health_check().await.unwrap();

    // Assert
    assert_eq!(recovered.components["search"].status, ComponentStatus::Healthy);
    assert!(recovered.components["search"].issues.is_empty());
    assert!(plane.monitor().active_alerts().is_empty());
    assert_eq!(search.calls(), 2);
}
