use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::debug;

/// Samples used for the trend of each resource.
pub const TREND_WINDOW: usize = 3;
const TREND_TOLERANCE: f64 = 2.0;

/// Warning threshold as a fraction of the critical threshold.
pub const WARNING_FRACTION: f64 = 0.8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Memory,
    Cpu,
    Disk,
    Network,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Raw reading of one resource.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UsageReading {
    pub used: f64,
    pub total: f64,
}

impl UsageReading {
    pub fn usage_percent(&self) -> f64 {
        if self.total <= 0.0 {
            0.0
        } else {
            (self.used / self.total * 100.0).clamp(0.0, 100.0)
        }
    }
}

/// Everything a sampler could read in one pass. Missing readings are
/// left out of scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSample {
    pub readings: BTreeMap<ResourceKind, UsageReading>,
}

impl ResourceSample {
    pub fn with(mut self, kind: ResourceKind, used: f64, total: f64) -> Self {
        self.readings.insert(kind, UsageReading { used, total });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceMetric {
    pub usage_percent: f64,
    pub used: f64,
    pub available: f64,
    pub total: f64,
    pub status: ResourceStatus,
    pub trend: Trend,
}

pub type ResourceMetrics = BTreeMap<ResourceKind, ResourceMetric>;

/// Critical usage percentages per resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceThresholds {
    pub memory: f64,
    pub cpu: f64,
    pub disk: f64,
    pub network: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            memory: 90.0,
            cpu: 90.0,
            disk: 95.0,
            network: 80.0,
        }
    }
}

impl ResourceThresholds {
    pub fn critical(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Memory => self.memory,
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Disk => self.disk,
            ResourceKind::Network => self.network,
        }
    }
}

pub fn status_for(usage_percent: f64, critical: f64) -> ResourceStatus {
    if usage_percent >= critical {
        ResourceStatus::Critical
    } else if usage_percent >= critical * WARNING_FRACTION {
        ResourceStatus::Warning
    } else {
        ResourceStatus::Normal
    }
}

pub fn trend_of(history: &VecDeque<f64>) -> Trend {
    let (Some(first), Some(last)) = (history.front(), history.back()) else {
        return Trend::Stable;
    };
    let delta = last - first;
    if delta > TREND_TOLERANCE {
        Trend::Increasing
    } else if delta < -TREND_TOLERANCE {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Turns raw samples into scored metrics, keeping a short usage history
/// per resource for trend detection.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    thresholds: ResourceThresholds,
    history: HashMap<ResourceKind, VecDeque<f64>>,
}

impl ResourceTracker {
    pub fn new(thresholds: ResourceThresholds) -> Self {
        Self {
            thresholds,
            history: HashMap::new(),
        }
    }

    pub fn evaluate(&mut self, sample: &ResourceSample) -> ResourceMetrics {
        let mut out = ResourceMetrics::new();

        for (kind, reading) in &sample.readings {
            let usage = reading.usage_percent();
            let history = self.history.entry(*kind).or_default();
            if history.len() == TREND_WINDOW {
                history.pop_front();
            }
            history.push_back(usage);

            out.insert(
                *kind,
                ResourceMetric {
                    usage_percent: usage,
                    used: reading.used,
                    available: (reading.total - reading.used).max(0.0),
                    total: reading.total,
                    status: status_for(usage, self.thresholds.critical(*kind)),
                    trend: trend_of(history),
                },
            );
        }

        out
    }
}

/// Source of resource readings.
pub trait ResourceSampler: Send + Sync {
    fn sample(&self) -> ResourceSample;
}

/// Reads resource usage from `/proc` and `statvfs`.
///
/// CPU and network usage are deltas, so the first sample reports neither.
#[derive(Debug)]
pub struct ProcResourceSampler {
    disk_path: PathBuf,
    network_capacity_bytes_per_sec: f64,
    last_cpu: Mutex<Option<CpuTimes>>,
    last_net: Mutex<Option<(u64, Instant)>>,
}

#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

impl ProcResourceSampler {
    pub fn new(disk_path: impl Into<PathBuf>, network_capacity_bytes_per_sec: f64) -> Self {
        Self {
            disk_path: disk_path.into(),
            network_capacity_bytes_per_sec,
            last_cpu: Mutex::new(None),
            last_net: Mutex::new(None),
        }
    }

    fn memory(&self) -> Option<UsageReading> {
        let content = fs::read_to_string("/proc/meminfo").ok()?;
        let (total_kb, available_kb) = parse_meminfo(&content)?;
        Some(UsageReading {
            used: (total_kb.saturating_sub(available_kb) * 1024) as f64,
            total: (total_kb * 1024) as f64,
        })
    }

    fn cpu(&self) -> Option<UsageReading> {
        let content = fs::read_to_string("/proc/stat").ok()?;
        let now = parse_cpu_times(&content)?;
        let prev = self.last_cpu.lock().replace(now)?;

        let total = now.total.saturating_sub(prev.total);
        let idle = now.idle.saturating_sub(prev.idle);
        if total == 0 {
            return None;
        }
        Some(UsageReading {
            used: total.saturating_sub(idle) as f64,
            total: total as f64,
        })
    }

    fn disk(&self) -> Option<UsageReading> {
        let stat = nix::sys::statvfs::statvfs(&self.disk_path)
            .map_err(|e| debug!(path = %self.disk_path.display(), error = %e, "statvfs failed"))
            .ok()?;
        let fragment = stat.fragment_size() as f64;
        let total = stat.blocks() as f64 * fragment;
        let available = stat.blocks_available() as f64 * fragment;
        Some(UsageReading {
            used: (total - available).max(0.0),
            total,
        })
    }

    fn network(&self) -> Option<UsageReading> {
        if self.network_capacity_bytes_per_sec <= 0.0 {
            return None;
        }
        let content = fs::read_to_string("/proc/net/dev").ok()?;
        let bytes = parse_net_dev_bytes(&content);
        let now = Instant::now();
        let (prev_bytes, prev_at) = self.last_net.lock().replace((bytes, now))?;

        let elapsed = now.duration_since(prev_at).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let rate = bytes.saturating_sub(prev_bytes) as f64 / elapsed;
        Some(UsageReading {
            used: rate.min(self.network_capacity_bytes_per_sec),
            total: self.network_capacity_bytes_per_sec,
        })
    }
}

impl ResourceSampler for ProcResourceSampler {
    fn sample(&self) -> ResourceSample {
        let mut sample = ResourceSample::default();
        let readings = [
            (ResourceKind::Memory, self.memory()),
            (ResourceKind::Cpu, self.cpu()),
            (ResourceKind::Disk, self.disk()),
            (ResourceKind::Network, self.network()),
        ];
        for (kind, reading) in readings {
            if let Some(reading) = reading {
                sample.readings.insert(kind, reading);
            }
        }
        sample
    }
}

/// `(MemTotal, MemAvailable)` in kB.
pub(crate) fn parse_meminfo(content: &str) -> Option<(u64, u64)> {
    let mut total = None;
    let mut available = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("MemTotal:") => total = parts.next().and_then(|v| v.parse().ok()),
            Some("MemAvailable:") => available = parts.next().and_then(|v| v.parse().ok()),
            _ => {}
        }
    }
    Some((total?, available?))
}

fn parse_cpu_times(content: &str) -> Option<CpuTimes> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect();
    if values.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        idle,
        total: values.iter().sum(),
    })
}

/// Received plus transmitted bytes over all non-loopback interfaces.
fn parse_net_dev_bytes(content: &str) -> u64 {
    content
        .lines()
        .skip(2)
        .filter_map(|line| line.split_once(':'))
        .filter(|(iface, _)| iface.trim() != "lo")
        .map(|(_, rest)| {
            let cols: Vec<u64> = rest
                .split_whitespace()
                .filter_map(|v| v.parse().ok())
                .collect();
            cols.first().copied().unwrap_or(0) + cols.get(8).copied().unwrap_or(0)
        })
        .sum()
}
