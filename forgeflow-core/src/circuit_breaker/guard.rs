use crate::circuit_breaker::manager::CircuitBreakerManager;
use tokio::time::Instant;

/// RAII recorder for a single admitted call.
///
/// Invariants:
/// - Created only after `admit()` admitted the call, under `epoch`
/// - The result is recorded exactly once: by `finish()`, or as a failure on
///   Drop when the operation panicked or its future was cancelled
pub(crate) struct CallRecorder<'a> {
    manager: &'a CircuitBreakerManager,
    name: &'a str,
    epoch: u64,
    started: Instant,
    armed: bool,
}

impl<'a> CallRecorder<'a> {
    pub(crate) fn admitted(manager: &'a CircuitBreakerManager, name: &'a str, epoch: u64) -> Self {
        Self {
            manager,
            name,
            epoch,
            started: Instant::now(),
            armed: true,
        }
    }

    pub(crate) fn finish(mut self, success: bool, error: Option<&str>) {
        self.armed = false;
        self.manager.record_admitted(
            self.name,
            self.epoch,
            success,
            self.started.elapsed(),
            error,
        );
    }
}

impl Drop for CallRecorder<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.record_admitted(
                self.name,
                self.epoch,
                false,
                self.started.elapsed(),
                Some("operation did not complete"),
            );
        }
    }
}
