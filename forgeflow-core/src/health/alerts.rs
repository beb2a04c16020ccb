use crate::events::{ControlPlaneEvent, EventBus};
use crate::health::component::{HealthIssue, IssueSeverity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Rolling window of the per-key alert rate limiter.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertSeverity {
    /// Only high and critical issues raise alerts.
    pub fn for_issue(severity: IssueSeverity) -> Option<Self> {
        match severity {
            IssueSeverity::Critical => Some(AlertSeverity::Critical),
            IssueSeverity::High => Some(AlertSeverity::Error),
            IssueSeverity::Medium | IssueSeverity::Low => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AlertChannel {
    Log,
    Event,
}

impl FromStr for AlertChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" | "console" => Ok(AlertChannel::Log),
            "event" | "events" => Ok(AlertChannel::Event),
            other => Err(format!("unknown alert channel '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub component: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub occurrence_count: u32,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertParams {
    pub channels: Vec<AlertChannel>,
    pub max_alerts_per_minute: u32,
    pub history_size: usize,
}

impl Default for AlertParams {
    fn default() -> Self {
        Self {
            channels: vec![AlertChannel::Log, AlertChannel::Event],
            max_alerts_per_minute: 10,
            history_size: 500,
        }
    }
}

/// Outcome of raising an alert condition.
#[derive(Debug, Clone, PartialEq)]
pub enum RaiseOutcome {
    Created(String),
    Updated(String),
    Suppressed,
}

type AlertKey = (String, String);

/// Active alerts keyed by `(component, category)` with per-key rate limiting.
#[derive(Debug)]
pub struct AlertManager {
    params: AlertParams,
    active: HashMap<AlertKey, SystemAlert>,
    created_at: HashMap<AlertKey, VecDeque<Instant>>,
    history: VecDeque<SystemAlert>,
    suppressed: u64,
    events: EventBus,
}

impl AlertManager {
    pub fn new(params: AlertParams, events: EventBus) -> Self {
        Self {
            params,
            active: HashMap::new(),
            created_at: HashMap::new(),
            history: VecDeque::new(),
            suppressed: 0,
            events,
        }
    }

    /// Raises (or refreshes) the alert for a component condition.
    pub fn raise(
        &mut self,
        component: &str,
        category: &str,
        severity: AlertSeverity,
        message: &str,
    ) -> RaiseOutcome {
        let key = (component.to_string(), category.to_string());
        let now = Utc::now();

        if let Some(alert) = self.active.get_mut(&key) {
            alert.updated_at = now;
            alert.occurrence_count = alert.occurrence_count.saturating_add(1);
            alert.severity = severity;
            alert.message = message.to_string();
            return RaiseOutcome::Updated(alert.id.clone());
        }

        if !self.admit(&key) {
            self.suppressed += 1;
            debug!(
                event = "alert_suppressed",
                component = component,
                category = category,
                "alert rate limit reached"
            );
            return RaiseOutcome::Suppressed;
        }

        let alert = SystemAlert {
            id: Uuid::new_v4().to_string(),
            alert_type: "component_issue".to_string(),
            severity,
            title: format!("{component}: {category}"),
            message: message.to_string(),
            component: component.to_string(),
            category: category.to_string(),
            created_at: now,
            updated_at: now,
            occurrence_count: 1,
            acknowledged: false,
            acknowledged_at: None,
            resolved: false,
            resolved_at: None,
        };
        let id = alert.id.clone();
        self.notify(&alert);
        self.active.insert(key, alert);
        RaiseOutcome::Created(id)
    }

    /// Raises alerts for a component's high and critical issues and
    /// resolves its alerts whose condition is gone.
    pub fn reconcile(&mut self, component: &str, issues: &[HealthIssue]) {
        let mut current = HashSet::new();

        for issue in issues {
            let Some(severity) = AlertSeverity::for_issue(issue.severity) else {
                continue;
            };
            current.insert(issue.category.clone());
            self.raise(component, &issue.category, severity, &issue.description);
        }

        let gone: Vec<String> = self
            .active
            .iter()
            .filter(|((c, category), _)| c == component && !current.contains(category))
            .map(|(_, alert)| alert.id.clone())
            .collect();
        for id in gone {
            self.resolve(&id);
        }
    }

    /// Resolves every active alert of a component.
    pub fn resolve_component(&mut self, component: &str) {
        self.reconcile(component, &[]);
    }

    pub fn acknowledge(&mut self, id: &str) -> bool {
        let Some(alert) = self.active.values_mut().find(|a| a.id == id) else {
            return false;
        };
        if !alert.acknowledged {
            alert.acknowledged = true;
            alert.acknowledged_at = Some(Utc::now());
            info!(event = "alert_acknowledged", alert_id = id, component = %alert.component);
            self.events.publish(ControlPlaneEvent::AlertAcknowledged {
                alert_id: id.to_string(),
            });
        }
        true
    }

    pub fn resolve(&mut self, id: &str) -> bool {
        let Some(key) = self
            .active
            .iter()
            .find(|(_, a)| a.id == id)
            .map(|(k, _)| k.clone())
        else {
            return false;
        };
        let Some(mut alert) = self.active.remove(&key) else {
            return false;
        };

        alert.resolved = true;
        alert.resolved_at = Some(Utc::now());
        info!(
            event = "alert_resolved",
            alert_id = id,
            component = %alert.component,
            category = %alert.category
        );
        self.events.publish(ControlPlaneEvent::AlertResolved {
            alert_id: id.to_string(),
        });

        if self.history.len() >= self.params.history_size {
            self.history.pop_front();
        }
        if self.params.history_size > 0 {
            self.history.push_back(alert);
        }
        true
    }

    pub fn active(&self) -> Vec<SystemAlert> {
        let mut alerts: Vec<SystemAlert> = self.active.values().cloned().collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        alerts
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn history(&self) -> Vec<SystemAlert> {
        self.history.iter().cloned().collect()
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Keys that created an alert within the rate window.
    pub fn rate_limited_keys(&self) -> usize {
        self.created_at.len()
    }

    fn admit(&mut self, key: &AlertKey) -> bool {
        let now = Instant::now();
        // Keys drop out once their window drains.
        self.created_at.retain(|_, stamps| {
            while let Some(oldest) = stamps.front() {
                if now.duration_since(*oldest) >= RATE_WINDOW {
                    stamps.pop_front();
                } else {
                    break;
                }
            }
            !stamps.is_empty()
        });

        let stamps = self.created_at.entry(key.clone()).or_default();
        if stamps.len() >= self.params.max_alerts_per_minute as usize {
            return false;
        }
        stamps.push_back(now);
        true
    }

    fn notify(&self, alert: &SystemAlert) {
        for channel in &self.params.channels {
            match channel {
                AlertChannel::Log => match alert.severity {
                    AlertSeverity::Critical | AlertSeverity::Error => error!(
                        event = "alert_created",
                        alert_id = %alert.id,
                        severity = ?alert.severity,
                        component = %alert.component,
                        category = %alert.category,
                        message = %alert.message
                    ),
                    AlertSeverity::Warning => warn!(
                        event = "alert_created",
                        alert_id = %alert.id,
                        component = %alert.component,
                        category = %alert.category,
                        message = %alert.message
                    ),
                    AlertSeverity::Info => info!(
                        event = "alert_created",
                        alert_id = %alert.id,
                        component = %alert.component,
                        category = %alert.category,
                        message = %alert.message
                    ),
                },
                AlertChannel::Event => self.events.publish(ControlPlaneEvent::AlertCreated {
                    alert: alert.clone(),
                }),
            }
        }
    }
}
