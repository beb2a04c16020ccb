use crate::circuit_breaker::{
    BreakerError, CircuitBreakerManager, CircuitBreakerParams, CircuitState, GuardError,
    HealthProbe,
};
use crate::events::{ControlPlaneEvent, EventBus};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

// ---------------------------
// Helpers
// ---------------------------

fn manager_with(failure_threshold: u32) -> CircuitBreakerManager {
    let defaults = CircuitBreakerParams {
        failure_threshold,
        timeout: Duration::from_millis(5000),
        ..Default::default()
    };
    CircuitBreakerManager::new(defaults, HashMap::new(), EventBus::default()).unwrap()
}

async fn failing_call(m: &CircuitBreakerManager, name: &str) {
    let _ = m
        .guard(name, || async { Err::<(), _>("upstream unavailable".to_string()) })
        .await;
}

struct ToggleProbe {
    healthy: AtomicBool,
    calls: AtomicU32,
}

#[async_trait]
impl HealthProbe for ToggleProbe {
    async fn probe(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }
}

// ---------------------------
// Tests
// ---------------------------

#[tokio::test]
async fn guard_fails_fast_without_invoking_operation_when_open() {
    // Arrange
    let m = manager_with(2);
    failing_call(&m, "search").await;
    failing_call(&m, "search").await;
    let invocations = AtomicU32::new(0);

    // Act
    let result = m
        .guard("search", || async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(42)
        })
        .await;

    // Assert
    assert!(matches!(result, Err(GuardError::CircuitOpen { ref name }) if name == "search"));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn guard_records_and_propagates_operation_errors() {
    // Arrange
    let m = manager_with(5);

    // Act
    let result = m
        .guard("issue-tracker", || async { Err::<(), _>("rate limited".to_string()) })
        .await;

    // Assert
    match result {
        Err(GuardError::Operation(e)) => assert_eq!(e, "rate limited"),
        other => panic!("unexpected result: {other:?}"),
    }
    let metrics = m.metrics("issue-tracker").unwrap();
    assert_eq!(metrics.failures, 1);
    assert_eq!(metrics.last_error.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn guard_returns_value_and_records_success() {
    // Arrange
    let m = manager_with(5);

    // Act
    let result = m.guard("search", || async { Ok::<_, String>("hits") }).await;

    // Assert
    assert_eq!(result.unwrap(), "hits");
    assert_eq!(m.metrics("search").unwrap().successes, 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_guarded_call_is_recorded_once_as_failure() {
    // Arrange
    let m = manager_with(5);

    // Act
    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        m.guard("search", || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, String>(())
        }),
    )
    .await;

    // Assert
    assert!(outcome.is_err());
    let metrics = m.metrics("search").unwrap();
    assert_eq!(metrics.total_calls, 1);
    assert_eq!(metrics.failures, 1);
}

#[tokio::test(start_paused = true)]
async fn guarded_call_outliving_the_open_window_does_not_free_a_half_open_slot() {
    // Arrange
    let m = manager_with(3);
    let (release, gate) = oneshot::channel::<()>();
    let long_call = m.guard("search", move || async move {
        let _ = gate.await;
        Ok::<_, String>(())
    });

    // Act
    let driver = async {
        for _ in 0..3 {
            failing_call(&m, "search").await;
        }
        tokio::time::advance(Duration::from_millis(5000)).await;
        assert!(m.can_execute("search"));

        let _ = release.send(());
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    };
    let (long_result, ()) = tokio::join!(long_call, driver);

    // Assert
    assert!(long_result.is_ok());
    assert_eq!(m.state("search"), CircuitState::HalfOpen);
    assert!(!m.can_execute("search"));
    assert_eq!(m.metrics("search").unwrap().total_calls, 4);
}

#[tokio::test]
async fn panicking_guarded_call_is_recorded_as_failure() {
    // Arrange
    let m = Arc::new(manager_with(5));
    let task_manager = Arc::clone(&m);

    // Act
    let joined = tokio::spawn(async move {
        task_manager
            .guard("search", || async {
                if true {
                    panic!("checker exploded");
                }
                Ok::<_, String>(())
            })
            .await
    })
    .await;

    // Assert
    assert!(joined.is_err());
    let metrics = m.metrics("search").unwrap();
    assert_eq!(metrics.total_calls, 1);
    assert_eq!(metrics.failures, 1);
}

#[tokio::test]
async fn state_changes_are_published() {
    // Arrange
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let m = CircuitBreakerManager::new(
        CircuitBreakerParams {
            failure_threshold: 1,
            ..Default::default()
        },
        HashMap::new(),
        events,
    )
    .unwrap();

    // Act
    failing_call(&m, "search").await;

    // Assert
    match rx.recv().await.unwrap() {
        ControlPlaneEvent::CircuitStateChanged {
            breaker, from, to, reason,
        } => {
            assert_eq!(breaker, "search");
            assert_eq!(from, CircuitState::Closed);
            assert_eq!(to, CircuitState::Open);
            assert_eq!(reason, "failure_threshold_exceeded");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn successful_probe_moves_open_circuit_to_half_open() {
    // Arrange
    let m = CircuitBreakerManager::new(
        CircuitBreakerParams {
            failure_threshold: 1,
            timeout: Duration::from_secs(600),
            probe_interval: Some(Duration::from_secs(1)),
            ..Default::default()
        },
        HashMap::new(),
        EventBus::default(),
    )
    .unwrap();
    let probe = Arc::new(ToggleProbe {
        healthy: AtomicBool::new(false),
        calls: AtomicU32::new(0),
    });
    m.register_probe("search", probe.clone());
    failing_call(&m, "search").await;

    // Act
    m.run_probes().await;
    let after_failed_probe = m.state("search");
    probe.healthy.store(true, Ordering::SeqCst);
    m.run_probes().await; // not due yet
    tokio::time::advance(Duration::from_secs(1)).await;
    m.run_probes().await;

    // Assert
    assert_eq!(after_failed_probe, CircuitState::Open);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    assert_eq!(m.state("search"), CircuitState::HalfOpen);
}

#[tokio::test]
async fn force_state_creates_and_isolates_unknown_breaker() {
    // Arrange
    let m = manager_with(5);

    // Act
    m.force_state("agent-pool", CircuitState::Open, "isolated");

    // Assert
    assert!(m.contains("agent-pool"));
    assert!(!m.can_execute("agent-pool"));
}

#[tokio::test]
async fn named_overrides_apply_to_their_breaker_only() {
    // Arrange
    let mut overrides = HashMap::new();
    overrides.insert(
        "issue-tracker".to_string(),
        CircuitBreakerParams {
            failure_threshold: 1,
            ..Default::default()
        },
    );
    let m = CircuitBreakerManager::new(CircuitBreakerParams::default(), overrides, EventBus::default())
        .unwrap();

    // Act
    failing_call(&m, "issue-tracker").await;
    failing_call(&m, "search").await;

    // Assert
    assert_eq!(m.state("issue-tracker"), CircuitState::Open);
    assert_eq!(m.state("search"), CircuitState::Closed);
}

#[test]
fn invalid_override_fails_construction() {
    let mut overrides = HashMap::new();
    overrides.insert(
        "search".to_string(),
        CircuitBreakerParams {
            timeout: Duration::from_millis(10),
            ..Default::default()
        },
    );

    let result = CircuitBreakerManager::new(CircuitBreakerParams::default(), overrides, EventBus::default());

    assert!(matches!(result, Err(BreakerError::InvalidConfig { name, .. }) if name == "search"));
}

#[tokio::test]
async fn reset_of_unknown_breaker_is_an_error() {
    let m = manager_with(5);

    let result = m.reset("missing");

    assert_eq!(
        result,
        Err(BreakerError::UnknownBreaker {
            name: "missing".into()
        })
    );
}

#[tokio::test]
async fn admin_views_are_sorted_and_detailed() {
    // Arrange
    let m = manager_with(1);
    failing_call(&m, "search").await;
    let _ = m.guard("agents", || async { Ok::<_, String>(()) }).await;

    // Act
    let views = m.list(true);

    // Assert
    let names: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["agents", "search"]);
    let search = &views[1];
    assert_eq!(search.state, CircuitState::Open);
    let details = search.details.as_ref().unwrap();
    assert!(details.opened_at_rfc3339.is_some());
    assert_eq!(details.transitions.len(), 1);
}
