use std::collections::VecDeque;
use std::time::Duration;

/// Number of most recent call results kept for rate computation.
pub const RESULT_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    success: bool,
    slow: bool,
    duration: Duration,
}

/// Bounded sliding window over the most recent call results.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResultWindow {
    records: VecDeque<CallRecord>,
}

impl ResultWindow {
    pub fn push(&mut self, success: bool, duration: Duration, slow_threshold: Duration) {
        if self.records.len() == RESULT_WINDOW {
            self.records.pop_front();
        }
        self.records.push_back(CallRecord {
            success,
            slow: duration >= slow_threshold,
            duration,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn ratio(&self, pred: impl Fn(&CallRecord) -> bool) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let hits = self.records.iter().filter(|r| pred(r)).count();
        hits as f64 / self.records.len() as f64
    }

    pub fn error_rate(&self) -> f64 {
        self.ratio(|r| !r.success)
    }

    pub fn slow_call_rate(&self) -> f64 {
        self.ratio(|r| r.slow)
    }

    pub fn success_rate(&self) -> f64 {
        if self.records.is_empty() {
            1.0
        } else {
            1.0 - self.error_rate()
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.records.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.records.iter().map(|r| r.duration).sum();
        total / self.records.len() as u32
    }
}
