//! Graceful degradation.
//!
//! Maps each health snapshot to a degradation level, runs the level's
//! mitigations and per-component fallback strategies, and walks back down
//! as health recovers. Level 0 is optimal; the highest level is emergency
//! mode, where every non-core component is isolated.

mod error;
mod level;
mod state;
mod strategy;
mod system;

#[cfg(test)]
mod tests;

pub use error::DegradationError;
pub use level::{
    CRITICAL_COMPONENT_FLOOR, DegradationLevel, FailureBudget, FailureCounts,
    HIGH_COMPONENTS_FLOOR, LevelAction, LevelTable,
};
pub use state::{DegradationEvent, DegradationState, FailedActivation};
pub use strategy::{
    ActionError, ActiveStrategy, ComponentHooks, FallbackAction, FallbackActionKind,
    FallbackStrategy, FeatureProbe, StrategyStatus,
};
pub use system::{DegradationParams, EVALUATION_GRACE, GracefulDegradationSystem};
