use async_trait::async_trait;
use forgeflow_core::degradation::{ActionError, ComponentHooks, FallbackAction, FallbackActionKind};
use forgeflow_core::health::{
    CheckError, ComponentChecker, ComponentReport, ComponentStatus, ResourceSample, ResourceSampler,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Checker whose answer the test sets between ticks.
pub struct ScriptedComponent {
    next: Mutex<Result<ComponentReport, CheckError>>,
    calls: AtomicU32,
}

impl ScriptedComponent {
    pub fn new(status: ComponentStatus) -> Arc<Self> {
        Arc::new(Self {
            next: Mutex::new(Ok(ComponentReport::with_status(status))),
            calls: AtomicU32::new(0),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(ComponentStatus::Healthy)
    }

    pub fn set_status(&self, status: ComponentStatus) {
        *self.next.lock() = Ok(ComponentReport::with_status(status));
    }

    pub fn set_report(&self, report: ComponentReport) {
        *self.next.lock() = Ok(report);
    }

    pub fn fail(&self, reason: &str) {
        *self.next.lock() = Err(CheckError::failed(reason));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ComponentChecker for ScriptedComponent {
    async fn check(&self) -> Result<ComponentReport, CheckError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.next.lock().clone()
    }
}

/// Reports the same resource usage on every tick.
pub struct FixedSampler(pub ResourceSample);

impl ResourceSampler for FixedSampler {
    fn sample(&self) -> ResourceSample {
        self.0.clone()
    }
}

/// Hooks that record every action applied to or reverted from a component.
#[derive(Default)]
pub struct RecordingHooks {
    applied: Mutex<Vec<FallbackActionKind>>,
    reverted: Mutex<Vec<FallbackActionKind>>,
    failing: Mutex<Option<FallbackActionKind>>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes applying `kind` fail from now on.
    pub fn fail_on(&self, kind: FallbackActionKind) {
        *self.failing.lock() = Some(kind);
    }

    pub fn applied(&self) -> Vec<FallbackActionKind> {
        self.applied.lock().clone()
    }

    pub fn reverted(&self) -> Vec<FallbackActionKind> {
        self.reverted.lock().clone()
    }
}

#[async_trait]
impl ComponentHooks for RecordingHooks {
    async fn apply(&self, action: &FallbackAction) -> Result<(), ActionError> {
        if *self.failing.lock() == Some(action.kind) {
            return Err(ActionError::failed(action.kind, "refused by test hooks"));
        }
        self.applied.lock().push(action.kind);
        Ok(())
    }

    async fn revert(&self, action: &FallbackAction) -> Result<(), ActionError> {
        self.reverted.lock().push(action.kind);
        Ok(())
    }
}

#[derive(Debug)]
pub struct DependencyError(pub &'static str);

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Downstream dependency called through a circuit breaker.
#[derive(Default)]
pub struct FlakyDependency {
    failing: AtomicBool,
    invocations: AtomicU32,
}

impl FlakyDependency {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub async fn call(&self) -> Result<&'static str, DependencyError> {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Relaxed) {
            Err(DependencyError("connection refused"))
        } else {
            Ok("pong")
        }
    }
}
