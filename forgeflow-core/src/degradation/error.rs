use crate::health::ComponentStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DegradationError {
    #[error("invalid degradation levels: {reason}")]
    InvalidLevels { reason: String },

    #[error("unknown degradation level {level}")]
    UnknownLevel { level: u8 },

    #[error("no fallback strategy configured for component '{component}'")]
    UnknownStrategy { component: String },

    #[error("strategy for '{component}' does not apply while it is {status}")]
    NotApplicable {
        component: String,
        status: ComponentStatus,
    },

    #[error("activating strategy '{strategy}' for '{component}' failed: {reason}")]
    ActivationFailed {
        component: String,
        strategy: String,
        reason: String,
    },

    #[error("no active strategy for component '{component}'")]
    NotActive { component: String },

    #[error("strategy for '{component}' is not reversible")]
    NotReversible { component: String },

    #[error("reverting strategy for '{component}' failed: {reason}")]
    RevertFailed { component: String, reason: String },

    #[error("degradation system is shutting down")]
    ShuttingDown,
}
