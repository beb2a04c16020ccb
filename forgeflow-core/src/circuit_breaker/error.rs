use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError {
    #[error("invalid circuit breaker configuration for '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("unknown circuit breaker '{name}'")]
    UnknownBreaker { name: String },
}

/// Outcome of a guarded call that did not produce a value.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The breaker rejected the call; the operation was never invoked.
    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    #[error("guarded operation failed: {0}")]
    Operation(#[source] E),
}

impl<E> GuardError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GuardError::CircuitOpen { .. })
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            GuardError::Operation(e) => Some(e),
            GuardError::CircuitOpen { .. } => None,
        }
    }
}
