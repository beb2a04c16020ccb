use crate::circuit_breaker::CircuitState;
use crate::health::SystemAlert;
use serde::Serialize;
use tokio::sync::broadcast;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Everything the control plane announces to the outside world.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlPlaneEvent {
    HealthChecked {
        sequence: u64,
        overall_health: f64,
        active_alerts: usize,
    },
    AlertCreated {
        alert: SystemAlert,
    },
    AlertAcknowledged {
        alert_id: String,
    },
    AlertResolved {
        alert_id: String,
    },
    CircuitStateChanged {
        breaker: String,
        from: CircuitState,
        to: CircuitState,
        reason: String,
    },
    LevelChanged {
        from: u8,
        to: u8,
        reason: String,
        health: Option<f64>,
    },
    StrategyActivated {
        component: String,
        strategy: String,
    },
    StrategyDeactivated {
        component: String,
        strategy: String,
    },
    StrategyFailed {
        component: String,
        strategy: String,
        error: String,
    },
    EmergencyActivated {
        health: f64,
        isolated: Vec<String>,
    },
    EmergencyDeactivated {
        health: f64,
    },
    UserNotification {
        level: u8,
        message: String,
    },
}

/// Fan-out of control plane events.
///
/// Publishing never blocks: slow subscribers observe `RecvError::Lagged`
/// instead of stalling the evaluation loops.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ControlPlaneEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlPlaneEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ControlPlaneEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
