use crate::circuit_breaker::CircuitBreakerParams;
use crate::conf::{lower_config, parse_config};
use crate::degradation::{FallbackActionKind, LevelAction};
use crate::health::{AlertChannel, ComponentPriority, ComponentStatus};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::time::Duration;

#[test]
fn defaults_lower_to_default_params() {
    // Arrange
    let cfg = parse_config("", Path::new("empty.hcl")).unwrap();

    // Act
    let params = lower_config(&cfg).unwrap();

    // Assert
    assert_eq!(params.breaker_defaults, CircuitBreakerParams::default());
    assert_eq!(params.monitor.interval, Duration::from_secs(30));
    assert_eq!(
        params.monitor.alerts.channels,
        vec![AlertChannel::Log, AlertChannel::Event]
    );
    assert_eq!(params.degradation.levels.max_level(), 4);
    assert_eq!(params.degradation.evaluation_interval, Duration::from_secs(10));
    assert!(params.resources.is_some());
}

#[test]
fn breaker_overrides_inherit_shared_defaults() {
    let cfg = parse_config(
        r#"
circuit_breaker = {
  failure_threshold = 8
  volume_threshold  = 4
}

breakers = {
  llm = {
    failure_threshold = 2
    timeout_ms        = 2000
  }
}
"#,
        Path::new("breakers.hcl"),
    )
    .unwrap();

    let params = lower_config(&cfg).unwrap();

    let llm = &params.breaker_overrides["llm"];
    assert_eq!(llm.failure_threshold, 2);
    assert_eq!(llm.timeout, Duration::from_secs(2));
    assert_eq!(llm.volume_threshold, 4);
    assert_eq!(params.breaker_defaults.failure_threshold, 8);
}

#[test]
fn disabled_adaptive_block_lowers_to_none() {
    let cfg = parse_config(
        "circuit_breaker = {\n  adaptive = { enabled = false }\n}\n",
        Path::new("adaptive.hcl"),
    )
    .unwrap();

    let params = lower_config(&cfg).unwrap();

    assert_eq!(params.breaker_defaults.adaptive, None);
}

#[test]
fn components_levels_and_strategies_are_lowered() {
    let cfg = parse_config(
        r#"
health_monitor = {
  resource_monitoring = false
  components = {
    database = {
      weight   = 3
      priority = "critical"
    }
  }
}

degradation = {
  levels = [
    { id = 0, name = "normal", min_health = 60, max_health = 100 },
    {
      id              = 1
      name            = "limp"
      min_health      = 0
      max_health      = 59
      max_duration_ms = 60000
      failure_budget  = { critical = 0 }
      actions = [
        { type = "shed_capacity", percent = 40 },
        { type = "activate_fallback", component = "search" },
        { type = "enter_emergency_mode" },
      ]
    },
  ]
  strategies = {
    search = {
      name              = "serve_cached"
      applicable_states = ["degraded", "offline"]
      reversible        = false
      actions           = [{ type = "backup-service", critical = true }]
    }
  }
}
"#,
        Path::new("degradation.hcl"),
    )
    .unwrap();

    let params = lower_config(&cfg).unwrap();

    assert!(params.resources.is_none());
    let database = params.monitor.components["database"];
    assert_eq!(database.weight, 3.0);
    assert_eq!(database.priority, ComponentPriority::Critical);

    let levels = &params.degradation.levels;
    assert_eq!(levels.max_level(), 1);
    assert_eq!(levels.level_for_health(59.5), 1);
    assert_eq!(levels.capacity_for(1), 60);
    let limp = levels.get(1).unwrap();
    assert_eq!(limp.max_duration, Some(Duration::from_secs(60)));
    assert_eq!(limp.failure_budget.critical, 0);
    assert_eq!(limp.failure_budget.high, u32::MAX);
    assert_eq!(
        limp.actions[1],
        LevelAction::ActivateFallback {
            component: "search".into()
        }
    );
    assert_eq!(limp.actions[2], LevelAction::EnterEmergencyMode);

    let search = &params.degradation.strategies["search"];
    assert_eq!(search.name, "serve_cached");
    assert_eq!(
        search.applicable_states,
        vec![ComponentStatus::Degraded, ComponentStatus::Offline]
    );
    assert!(!search.reversible);
    assert_eq!(search.actions[0].kind, FallbackActionKind::BackupService);
    assert!(search.actions[0].critical);
}
