use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One utilization reading for one device, produced fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSample {
    /// Device index as reported by the query tool, e.g. `"0"`.
    pub device_id: String,
    /// Utilization in percent (0 – 100).
    pub utilization: u8,
}

impl UsageSample {
    pub fn new(device_id: impl Into<String>, utilization: u8) -> Self {
        Self {
            device_id:   device_id.into(),
            utilization: utilization.min(100),
        }
    }
}

/// Highest utilization among `samples`, `0` when nothing was observed.
pub fn max_utilization(samples: &[UsageSample]) -> u8 {
    samples.iter().map(|s| s.utilization).max().unwrap_or(0)
}

/// Read-only copy of one device's rolling history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHistory {
    pub device_id: String,
    /// Utilization values, newest first.
    pub samples: Vec<u8>,
    /// Maximum number of values kept.
    pub capacity: usize,
}

impl DeviceHistory {
    /// Most recent reading, if any.
    #[must_use]
    pub fn latest(&self) -> Option<u8> {
        self.samples.first().copied()
    }
}

/// Everything the presentation side may read, captured at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Per-device histories, sorted by device id.
    pub devices: Vec<DeviceHistory>,
    /// Recency label, e.g. `"Now (42%)"` or `"3m ago"`.
    pub label: String,
    /// Whether the last cycle asked the OS to stay awake.
    pub inhibiting: bool,
    /// Grace period currently in force.
    pub idle_threshold_secs: u64,
    /// Wall-clock time the snapshot was taken.
    pub taken_at: DateTime<Local>,
}
