use super::{PanickingChecker, ScriptedChecker};
use crate::events::EventBus;
use crate::health::{
    CheckError, ComponentPriority, ComponentReport, ComponentSettings, ComponentStatus,
    HealthMonitorParams, IntegrityChecker, IntegritySummary, IssueReport, IssueSeverity,
    MonitorError, ResourceKind, ResourceSample, ResourceSampler, SystemHealthMonitor,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------
// Helpers
// ---------------------------

fn monitor() -> SystemHealthMonitor {
    SystemHealthMonitor::new(HealthMonitorParams::default(), EventBus::default())
}

fn weighted(weight: f64) -> ComponentSettings {
    ComponentSettings {
        weight,
        priority: ComponentPriority::Medium,
    }
}

struct FixedSampler(ResourceSample);

impl ResourceSampler for FixedSampler {
    fn sample(&self) -> ResourceSample {
        self.0.clone()
    }
}

struct FixedIntegrity(f64);

#[async_trait]
impl IntegrityChecker for FixedIntegrity {
    async fn check(&self) -> IntegritySummary {
        IntegritySummary {
            score: self.0,
            checks_passed: 1,
            checks_failed: 0,
            details: Vec::new(),
        }
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ---------------------------
// Tests
// ---------------------------

#[tokio::test(start_paused = true)]
async fn failed_and_healthy_components_average_by_weight() {
    // Arrange
    let m = monitor();
    m.register_component_with(
        "issue-tracker",
        ScriptedChecker::failing(CheckError::failed("connection refused")),
        weighted(50.0),
    );
    m.register_component_with(
        "search",
        ScriptedChecker::returning(ComponentReport::healthy()),
        weighted(50.0),
    );

    // Act
    let snapshot = m.perform_health_check().await.unwrap();

    // Assert
    assert!(approx(snapshot.overall_health, 50.0), "was {}", snapshot.overall_health);
    let tracker = &snapshot.components["issue-tracker"];
    assert_eq!(tracker.status, ComponentStatus::Critical);
    assert_eq!(tracker.score, 0.0);
    assert_eq!(tracker.issues[0].category, "check_failed");
    assert_eq!(snapshot.components["search"].score, 100.0);
}

#[tokio::test(start_paused = true)]
async fn hanging_check_times_out_without_blocking_others() {
    // Arrange
    let m = monitor();
    m.register_component("agents", ScriptedChecker::hanging(Duration::from_secs(3600)));
    m.register_component("search", ScriptedChecker::returning(ComponentReport::healthy()));

    // Act
    let snapshot = m.perform_health_check().await.unwrap();

    // Assert
    let agents = &snapshot.components["agents"];
    assert_eq!(agents.status, ComponentStatus::Critical);
    assert_eq!(agents.score, 0.0);
    assert_eq!(agents.issues[0].category, "check_timeout");
    assert_eq!(snapshot.components["search"].status, ComponentStatus::Healthy);
}

#[tokio::test]
async fn panicking_check_is_recorded_as_critical() {
    // Arrange
    let m = monitor();
    m.register_component("agents", Arc::new(PanickingChecker));

    // Act
    let snapshot = m.perform_health_check().await.unwrap();

    // Assert
    let agents = &snapshot.components["agents"];
    assert_eq!(agents.status, ComponentStatus::Critical);
    assert_eq!(agents.issues[0].category, "check_panicked");
}

#[tokio::test(start_paused = true)]
async fn same_inputs_give_bit_identical_health() {
    // Arrange
    let build = || {
        let m = monitor();
        m.register_component(
            "search",
            ScriptedChecker::returning(
                ComponentReport::with_status(ComponentStatus::Degraded)
                    .response_time(Duration::from_millis(1700))
                    .error_rate(0.13),
            ),
        );
        m.register_component(
            "tracker",
            ScriptedChecker::returning(ComponentReport::healthy().error_rate(0.07)),
        );
        m.set_resource_sampler(Arc::new(FixedSampler(
            ResourceSample::default().with(ResourceKind::Memory, 77.0, 100.0),
        )));
        m
    };

    // Act
    let a = build().perform_health_check().await.unwrap();
    let b = build().perform_health_check().await.unwrap();

    // Assert
    assert_eq!(a.overall_health.to_bits(), b.overall_health.to_bits());
}

#[tokio::test(start_paused = true)]
async fn resources_and_integrity_are_weighted_as_blocks() {
    // Arrange
    let m = monitor();
    m.register_component("search", ScriptedChecker::returning(ComponentReport::healthy()));
    m.set_resource_sampler(Arc::new(FixedSampler(
        ResourceSample::default()
            .with(ResourceKind::Memory, 95.0, 100.0)
            .with(ResourceKind::Cpu, 10.0, 100.0),
    )));
    m.set_integrity_checker(Arc::new(FixedIntegrity(50.0)));

    // Act
    let snapshot = m.perform_health_check().await.unwrap();

    // Assert
    // components 100, resources (30 + 100) / 2 = 65, integrity 50
    let expected = 100.0 * 0.6 + 65.0 * 0.2 + 50.0 * 0.2;
    assert!(approx(snapshot.overall_health, expected), "was {}", snapshot.overall_health);
    assert_eq!(snapshot.resources.len(), 2);
    assert_eq!(snapshot.integrity.as_ref().map(|i| i.score), Some(50.0));
}

struct StalledSampler;

impl ResourceSampler for StalledSampler {
    fn sample(&self) -> ResourceSample {
        std::thread::sleep(Duration::from_millis(500));
        ResourceSample::default().with(ResourceKind::Disk, 10.0, 100.0)
    }
}

#[tokio::test]
async fn stalled_resource_sampler_does_not_hold_up_the_tick() {
    // Arrange
    let m = SystemHealthMonitor::new(
        HealthMonitorParams {
            check_timeout: Duration::from_millis(50),
            ..HealthMonitorParams::default()
        },
        EventBus::default(),
    );
    m.register_component("search", ScriptedChecker::returning(ComponentReport::healthy()));
    m.set_resource_sampler(Arc::new(StalledSampler));

    // Act
    let started = std::time::Instant::now();
    let snapshot = m.perform_health_check().await.unwrap();

    // Assert
    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(snapshot.resources.is_empty());
    assert!(approx(snapshot.overall_health, 100.0));
}

#[tokio::test(start_paused = true)]
async fn critical_issue_raises_one_alert_until_it_clears() {
    // Arrange
    let m = monitor();
    let checker = ScriptedChecker::returning(
        ComponentReport::with_status(ComponentStatus::Critical).issue(IssueReport::new(
            IssueSeverity::Critical,
            "index_corrupt",
            "search index failed verification",
        )),
    );
    m.register_component("search", checker.clone());

    // Act
    m.perform_health_check().await.unwrap();
    let second = m.perform_health_check().await.unwrap();
    checker.set(Ok(ComponentReport::healthy()));
    let cleared = m.perform_health_check().await.unwrap();

    // Assert
    assert_eq!(second.active_alerts.len(), 1);
    assert_eq!(second.active_alerts[0].occurrence_count, 2);
    assert_eq!(second.components["search"].issues[0].occurrence_count, 2);
    assert!(cleared.active_alerts.is_empty());
    assert!(cleared.components["search"].issues.is_empty());
    assert_eq!(m.alert_history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn alerts_can_be_acknowledged_and_resolved() {
    // Arrange
    let m = monitor();
    m.register_component("agents", ScriptedChecker::failing(CheckError::failed("down")));
    let snapshot = m.perform_health_check().await.unwrap();
    let id = snapshot.active_alerts[0].id.clone();

    // Act
    let acked = m.acknowledge_alert(&id);
    let acked_flag = m.active_alerts()[0].acknowledged;
    let resolved = m.resolve_alert(&id);

    // Assert
    assert!(acked);
    assert!(acked_flag);
    assert!(resolved);
    assert!(m.active_alerts().is_empty());
    assert!(!m.resolve_alert("unknown"));
}

#[tokio::test(start_paused = true)]
async fn history_keeps_only_the_most_recent_snapshots() {
    // Arrange
    let m = SystemHealthMonitor::new(
        HealthMonitorParams {
            history_size: 3,
            ..Default::default()
        },
        EventBus::default(),
    );

    // Act
    for _ in 0..5 {
        m.perform_health_check().await.unwrap();
    }

    // Assert
    let sequences: Vec<u64> = m.history().iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![3, 4, 5]);
    assert_eq!(m.current_health().map(|s| s.sequence), Some(5));
}

#[tokio::test(start_paused = true)]
async fn lagging_subscriber_misses_snapshots_instead_of_blocking() {
    // Arrange
    let m = SystemHealthMonitor::new(
        HealthMonitorParams {
            snapshot_channel_capacity: 1,
            ..Default::default()
        },
        EventBus::default(),
    );
    let mut rx = m.subscribe_snapshots();

    // Act
    m.perform_health_check().await.unwrap();
    m.perform_health_check().await.unwrap();

    // Assert
    assert_eq!(rx.try_recv().map(|s| s.sequence).ok(), Some(1));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn periodic_loop_ticks_until_stopped() {
    // Arrange
    let m = Arc::new(SystemHealthMonitor::new(
        HealthMonitorParams {
            interval: Duration::from_secs(10),
            ..Default::default()
        },
        EventBus::default(),
    ));
    m.register_component("search", ScriptedChecker::returning(ComponentReport::healthy()));
    let mut rx = m.subscribe_snapshots();

    // Act
    m.start();
    let first = rx.recv().await.map(|s| s.sequence);
    let second = rx.recv().await.map(|s| s.sequence);
    m.stop().await;

    // Assert
    assert_eq!(first, Some(1));
    assert_eq!(second, Some(2));
    assert!(m.component_names().is_empty());
    assert_eq!(m.perform_health_check().await.err(), Some(MonitorError::ShuttingDown));
}

#[tokio::test(start_paused = true)]
async fn unregistering_resolves_component_alerts() {
    // Arrange
    let m = monitor();
    m.register_component("agents", ScriptedChecker::failing(CheckError::failed("down")));
    m.perform_health_check().await.unwrap();

    // Act
    let removed = m.unregister_component("agents");

    // Assert
    assert!(removed);
    assert!(m.active_alerts().is_empty());
    let snapshot = m.perform_health_check().await.unwrap();
    assert!(snapshot.components.is_empty());
}
