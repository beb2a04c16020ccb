pub mod components;
pub mod tracing;

pub use components::{DependencyError, FixedSampler, FlakyDependency, RecordingHooks, ScriptedComponent};
pub use self::tracing::{CapturedEvent, EventLog, capture_tracing};
