use crate::recency::classify;
use crate::state::{max_utilization, UsageSample};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Idle-sleep timeout assumed when the OS setting cannot be read.
pub const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 300;

/// Level the OS stay-awake signal should be set to after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Reset the system idle timer (display may still sleep).
    Assert,
    /// Hand idle policy back to the OS.
    Release,
}

/// Process-wide activity bookkeeping shared by the controller and the
/// recency label.
#[derive(Debug, Clone)]
pub struct ActivityState {
    pub last_activity:       Instant,
    pub inhibition_asserted: bool,
    pub idle_threshold:      Duration,
    pub label:               String,
}

/// Result of one cycle's evaluation.  `label` and `decision` are derived from
/// the same `now`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision:       Decision,
    pub label:          String,
    pub max_usage:      u8,
    pub since_activity: Duration,
    /// `true` when the decision differs from the previous cycle's.
    pub changed:        bool,
}

/// Decides, every cycle, whether the machine must stay awake.
///
/// Busy GPU → assert.  Idle GPU → keep asserting until the OS's own idle
/// timeout has elapsed since the last busy sample, then release.
#[derive(Debug)]
pub struct InhibitionController {
    state: Mutex<ActivityState>,
}

impl InhibitionController {
    /// `now` seeds the last-activity time so the grace period starts counting
    /// at startup.
    pub fn new(idle_threshold_secs: u64, now: Instant) -> Self {
        Self {
            state: Mutex::new(ActivityState {
                last_activity:       now,
                inhibition_asserted: false,
                idle_threshold:      Duration::from_secs(idle_threshold_secs),
                label:               classify(0, Duration::ZERO),
            }),
        }
    }

    pub fn evaluate(&self, samples: &[UsageSample], now: Instant) -> Evaluation {
        let mut state = self.lock();
        let max_usage = max_utilization(samples);

        if max_usage > 0 {
            state.last_activity = now;
        }
        let since_activity = now.saturating_duration_since(state.last_activity);

        let decision = if max_usage > 0 || since_activity < state.idle_threshold {
            Decision::Assert
        } else {
            Decision::Release
        };

        let asserted = decision == Decision::Assert;
        let changed = asserted != state.inhibition_asserted;
        state.inhibition_asserted = asserted;
        state.label = classify(max_usage, since_activity);

        Evaluation {
            decision,
            label: state.label.clone(),
            max_usage,
            since_activity,
            changed,
        }
    }

    pub fn set_idle_threshold(&self, secs: u64) {
        let mut state = self.lock();
        let secs_before = state.idle_threshold.as_secs();
        if secs_before != secs {
            tracing::info!("Idle threshold changed: {secs_before}s -> {secs}s");
        }
        state.idle_threshold = Duration::from_secs(secs);
    }

    pub fn idle_threshold_secs(&self) -> u64 {
        self.lock().idle_threshold.as_secs()
    }

    /// Copy of the current bookkeeping.
    pub fn state(&self) -> ActivityState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ActivityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u64 = 300;

    fn idle() -> Vec<UsageSample> {
        vec![UsageSample::new("0", 0)]
    }

    fn at(start: Instant, secs: u64) -> Instant {
        start + Duration::from_secs(secs)
    }

    #[test]
    fn grace_period_boundary() {
        let start = Instant::now();
        let ctl = InhibitionController::new(THRESHOLD, start);

        let inside = ctl.evaluate(&idle(), at(start, THRESHOLD - 1));
        assert_eq!(inside.decision, Decision::Assert);

        let outside = ctl.evaluate(&idle(), at(start, THRESHOLD + 1));
        assert_eq!(outside.decision, Decision::Release);
        assert!(outside.changed);
    }

    #[test]
    fn exact_threshold_releases() {
        let start = Instant::now();
        let ctl = InhibitionController::new(THRESHOLD, start);
        assert_eq!(ctl.evaluate(&[], at(start, THRESHOLD)).decision, Decision::Release);
    }

    #[test]
    fn any_usage_asserts_and_stamps_activity() {
        let start = Instant::now();
        let ctl = InhibitionController::new(THRESHOLD, start);
        let now = at(start, 10_000);

        let eval = ctl.evaluate(&[UsageSample::new("0", 1)], now);
        assert_eq!(eval.decision, Decision::Assert);
        assert_eq!(eval.label, "Now (1%)");
        assert_eq!(ctl.state().last_activity, now);
    }

    #[test]
    fn startup_counts_as_activity() {
        let start = Instant::now();
        let ctl = InhibitionController::new(THRESHOLD, start);
        let eval = ctl.evaluate(&[], start);
        assert_eq!(eval.decision, Decision::Assert);
        assert_eq!(eval.label, "Just now");
    }

    #[test]
    fn burst_then_silence() {
        let start = Instant::now();
        let ctl = InhibitionController::new(THRESHOLD, start);

        let first = ctl.evaluate(&[UsageSample::new("0", 80)], start);
        assert_eq!(first.decision, Decision::Assert);
        assert!(first.changed);

        for t in 1..THRESHOLD {
            let eval = ctl.evaluate(&[], at(start, t));
            assert_eq!(eval.decision, Decision::Assert, "cycle at {t}s");
            assert!(!eval.changed);
        }

        let last = ctl.evaluate(&[], at(start, THRESHOLD));
        assert_eq!(last.decision, Decision::Release);
        assert_eq!(last.label, "5m ago");
        assert!(!ctl.state().inhibition_asserted);
    }

    #[test]
    fn label_follows_the_same_timestamp() {
        let start = Instant::now();
        let ctl = InhibitionController::new(THRESHOLD, start);
        ctl.evaluate(&[UsageSample::new("0", 50)], start);

        let eval = ctl.evaluate(&[UsageSample::new("0", 0)], at(start, 65));
        assert_eq!(eval.since_activity, Duration::from_secs(65));
        assert_eq!(eval.label, "1m ago");
    }

    #[test]
    fn threshold_refresh_applies_next_cycle() {
        let start = Instant::now();
        let ctl = InhibitionController::new(THRESHOLD, start);
        ctl.set_idle_threshold(60);
        assert_eq!(ctl.idle_threshold_secs(), 60);
        assert_eq!(ctl.evaluate(&[], at(start, 61)).decision, Decision::Release);
    }
}
