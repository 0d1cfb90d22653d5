use crate::state::{DeviceHistory, UsageSample};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of cycles kept per device (one per second ≈ the last minute).
pub const DEFAULT_CAPACITY: usize = 60;

/// Rolling per-device utilization history.
///
/// Every read and write goes through a single lock, so a reader never sees a
/// device half-way through an update.
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    devices:  Mutex<BTreeMap<String, VecDeque<u8>>>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            devices:  Mutex::new(BTreeMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply one cycle's samples: push each value to the front of its device,
    /// evict from the back past capacity, then drop devices that did not
    /// report this cycle.
    pub fn update(&self, samples: &[UsageSample]) {
        let mut devices = self.lock();

        for sample in samples {
            let history = devices
                .entry(sample.device_id.clone())
                .or_insert_with(|| VecDeque::with_capacity(self.capacity));
            history.push_front(sample.utilization);
            history.truncate(self.capacity);
        }

        let present: HashSet<&str> = samples.iter().map(|s| s.device_id.as_str()).collect();
        devices.retain(|id, _| {
            let keep = present.contains(id.as_str());
            if !keep {
                tracing::info!("GPU {id} disappeared; dropping its history");
            }
            keep
        });
    }

    /// Copy of every device history, sorted by device id.
    pub fn snapshot(&self) -> Vec<DeviceHistory> {
        self.lock()
            .iter()
            .map(|(id, values)| DeviceHistory {
                device_id: id.clone(),
                samples:   values.iter().copied().collect(),
                capacity:  self.capacity,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, VecDeque<u8>>> {
        // Every mutation completes before the guard drops; a poisoned map is
        // still consistent.
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
