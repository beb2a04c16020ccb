use crate::health::{
    ResourceKind, ResourceSample, ResourceStatus, ResourceThresholds, ResourceTracker, Trend,
};
use pretty_assertions::assert_eq;

fn tracker() -> ResourceTracker {
    ResourceTracker::new(ResourceThresholds {
        memory: 90.0,
        cpu: 90.0,
        disk: 95.0,
        network: 80.0,
    })
}

fn memory(used: f64) -> ResourceSample {
    ResourceSample::default().with(ResourceKind::Memory, used, 100.0)
}

#[test]
fn status_is_derived_from_critical_threshold() {
    let mut t = tracker();

    let normal = t.evaluate(&memory(50.0))[&ResourceKind::Memory].status;
    let warning = t.evaluate(&memory(75.0))[&ResourceKind::Memory].status;
    let critical = t.evaluate(&memory(95.0))[&ResourceKind::Memory].status;

    assert_eq!(normal, ResourceStatus::Normal);
    assert_eq!(warning, ResourceStatus::Warning);
    assert_eq!(critical, ResourceStatus::Critical);
}

#[test]
fn trend_follows_the_last_three_samples() {
    // Arrange
    let mut t = tracker();

    // Act
    let first = t.evaluate(&memory(10.0))[&ResourceKind::Memory].trend;
    t.evaluate(&memory(20.0));
    let rising = t.evaluate(&memory(30.0))[&ResourceKind::Memory].trend;
    t.evaluate(&memory(31.0));
    let flat = t.evaluate(&memory(31.5))[&ResourceKind::Memory].trend;
    t.evaluate(&memory(20.0));
    let falling = t.evaluate(&memory(10.0))[&ResourceKind::Memory].trend;

    // Assert
    assert_eq!(first, Trend::Stable);
    assert_eq!(rising, Trend::Increasing);
    assert_eq!(flat, Trend::Stable);
    assert_eq!(falling, Trend::Decreasing);
}

#[test]
fn available_is_total_minus_used() {
    let mut t = tracker();

    let metrics = t.evaluate(&ResourceSample::default().with(ResourceKind::Disk, 250.0, 1000.0));

    let disk = &metrics[&ResourceKind::Disk];
    assert_eq!(disk.usage_percent, 25.0);
    assert_eq!(disk.available, 750.0);
}

#[test]
fn missing_readings_are_left_out() {
    let mut t = tracker();

    let metrics = t.evaluate(&ResourceSample::default());

    assert!(metrics.is_empty());
}
