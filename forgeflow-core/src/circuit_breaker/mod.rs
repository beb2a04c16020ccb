//! Per-operation circuit breakers.
//!
//! ## States
//!
//! - **Closed**: calls pass through; failures decay one per success.
//! - **Open**: calls are rejected until the open window elapses (or a
//!   health probe succeeds).
//! - **Half-Open**: a bounded number of probe calls decide between closing
//!   and reopening.

mod adaptive;
mod admin;
mod breaker;
mod error;
mod guard;
mod manager;
mod params;
mod window;

#[cfg(test)]
mod tests;

pub use adaptive::AdaptiveParams;
pub use admin::{AdminBreakerView, CircuitBreakerDetailsView, CircuitBreakerParamsView};
pub use breaker::{
    CircuitBreaker, CircuitBreakerMetrics, CircuitState, StateTransition, TRANSITION_LOG_SIZE,
};
pub use error::{BreakerError, GuardError};
pub use manager::{CircuitBreakerManager, HealthProbe, PROBE_TIMEOUT};
pub use params::{CircuitBreakerParams, MIN_TIMEOUT};
pub use window::RESULT_WINDOW;
