use chrono::Local;
use gpuwake_core::{
    Decision, Evaluation, HistoryStore, InhibitionController, MonitorSnapshot, SamplingError,
    UsageSample,
};
use gpuwake_system::{GpuSampler, SleepInhibitor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What one call to [`Monitor::tick`] did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A full cycle ran.
    Ran(CycleReport),
    /// Another cycle was still in flight; this one was dropped, not queued.
    Skipped,
    /// Shutdown has begun; no state was touched.
    Stopped,
}

/// Everything one sampling cycle observed and decided.
#[derive(Debug)]
pub struct CycleReport {
    /// Readings applied this cycle (empty when sampling failed).
    pub samples: Vec<UsageSample>,
    /// Why sampling failed, if it did.  The cycle still ran with no devices.
    pub sampling_error: Option<SamplingError>,
    pub evaluation: Evaluation,
}

/// Owns the history store and activity state and runs sampling cycles
/// against them.
#[derive(Debug)]
pub struct Monitor<S, I> {
    sampler:    S,
    inhibitor:  I,
    history:    HistoryStore,
    controller: InhibitionController,
    busy:       AtomicBool,
    /// `true` once shutdown has begun.  Held across a cycle's state writes so
    /// shutdown cannot slip in between the check and the writes.
    stopping:   Mutex<bool>,
}

impl<S: GpuSampler, I: SleepInhibitor> Monitor<S, I> {
    pub fn new(
        sampler: S,
        inhibitor: I,
        history_capacity: usize,
        idle_threshold_secs: u64,
    ) -> Self {
        Self {
            sampler,
            inhibitor,
            history: HistoryStore::new(history_capacity),
            controller: InhibitionController::new(idle_threshold_secs, Instant::now()),
            busy: AtomicBool::new(false),
            stopping: Mutex::new(false),
        }
    }

    /// Run one sampling cycle unless one is already in flight.
    ///
    /// The GPU query runs outside every lock; history and activity state are
    /// each updated in a single short critical section afterwards.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = CycleGuard::try_acquire(&self.busy) else {
            debug!("Previous cycle still running; skipping tick");
            return TickOutcome::Skipped;
        };
        if self.is_stopping() {
            return TickOutcome::Stopped;
        }

        let (samples, sampling_error) = match self.sampler.sample().await {
            Ok(samples) => (samples, None),
            Err(e) => {
                error!("GPU sampling failed: {e}");
                (Vec::new(), Some(e))
            }
        };

        let evaluation = {
            let stopping = self.stopping.lock().unwrap_or_else(PoisonError::into_inner);
            if *stopping {
                return TickOutcome::Stopped;
            }
            let now = Instant::now();
            self.history.update(&samples);
            self.controller.evaluate(&samples, now)
        };

        if evaluation.changed {
            match evaluation.decision {
                Decision::Assert => info!("GPU active ({}); keeping system awake", evaluation.label),
                Decision::Release => info!(
                    "GPU idle for {}s; allowing sleep",
                    evaluation.since_activity.as_secs()
                ),
            }
        }
        debug!(
            devices = samples.len(),
            max_usage = evaluation.max_usage,
            decision = ?evaluation.decision,
            "Cycle complete"
        );

        if let Err(e) = self.inhibitor.apply(evaluation.decision).await {
            warn!("Cannot set stay-awake level to {:?}: {e}", evaluation.decision);
        }

        TickOutcome::Ran(CycleReport {
            samples,
            sampling_error,
            evaluation,
        })
    }

    /// Hand idle policy back to the OS.
    pub async fn release(&self) {
        if let Err(e) = self.inhibitor.apply(Decision::Release).await {
            warn!("Cannot release stay-awake request: {e}");
        }
    }
}

impl<S, I> Monitor<S, I> {
    /// Read-only view for presentation.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.controller.state();
        MonitorSnapshot {
            devices: self.history.snapshot(),
            label: state.label,
            inhibiting: state.inhibition_asserted,
            idle_threshold_secs: state.idle_threshold.as_secs(),
            taken_at: Local::now(),
        }
    }

    /// Replace the grace period, e.g. after the OS setting was re-read.
    pub fn refresh_threshold(&self, secs: u64) {
        self.controller.set_idle_threshold(secs);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Stop accepting state changes.  Cycles still in flight finish without
    /// touching history or activity state; a cycle already writing state
    /// completes its writes before this returns.
    pub fn begin_shutdown(&self) {
        *self.stopping.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn is_stopping(&self) -> bool {
        *self.stopping.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-slot busy flag; cleared when dropped.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
