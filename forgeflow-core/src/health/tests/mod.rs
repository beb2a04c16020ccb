mod adapters_tests;
mod monitor_tests;
mod resources_tests;
mod scoring_tests;

use crate::health::{CheckError, ComponentChecker, ComponentReport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Checker whose next answer is set by the test.
pub(super) struct ScriptedChecker {
    answer: Mutex<Result<ComponentReport, CheckError>>,
    delay: Option<Duration>,
}

impl ScriptedChecker {
    pub(super) fn returning(report: ComponentReport) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Ok(report)),
            delay: None,
        })
    }

    pub(super) fn failing(error: CheckError) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Err(error)),
            delay: None,
        })
    }

    pub(super) fn hanging(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Ok(ComponentReport::healthy())),
            delay: Some(delay),
        })
    }

    pub(super) fn set(&self, answer: Result<ComponentReport, CheckError>) {
        *self.answer.lock() = answer;
    }
}

#[async_trait]
impl ComponentChecker for ScriptedChecker {
    async fn check(&self) -> Result<ComponentReport, CheckError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer.lock().clone()
    }
}

pub(super) struct PanickingChecker;

#[async_trait]
impl ComponentChecker for PanickingChecker {
    async fn check(&self) -> Result<ComponentReport, CheckError> {
        panic!("checker exploded");
    }
}
