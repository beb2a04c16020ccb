use parking_lot::Mutex;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, layer::Context};

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub target: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Events recorded while a capture guard is alive.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventLog {
    pub fn snapshot(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Events carrying `event = <name>`.
    pub fn named(&self, name: &str) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.field("event") == Some(name))
            .cloned()
            .collect()
    }
}

#[derive(Clone)]
pub struct TestEventLayer {
    log: EventLog,
}

/// Captures events on the current thread until the guard drops.
///
/// Use with the current-thread test runtime so spawned tasks are captured too.
pub fn capture_tracing() -> (EventLog, DefaultGuard) {
    let log = EventLog::default();
    let layer = TestEventLayer { log: log.clone() };
    let subscriber = tracing_subscriber::registry().with(layer);

    let guard = tracing::subscriber::set_default(subscriber);
    (log, guard)
}

impl<S> Layer<S> for TestEventLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Vec::new();
        let mut visitor = FieldVisitor {
            fields: &mut fields,
        };
        event.record(&mut visitor);

        let meta = event.metadata();

        self.log.events.lock().push(CapturedEvent {
            target: meta.target().to_string(),
            fields,
        });
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut Vec<(String, String)>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .push((field.name().to_string(), format!("{value:?}")));
    }
}
