//! OS stay-awake primitives.
//!
//! Every implementation is a level-set: applying the same [`Decision`] twice
//! in a row is harmless, and the monitor applies one every cycle.

#[cfg(windows)]
mod execution_state;
#[cfg(unix)]
mod held;
#[cfg(all(unix, not(target_os = "macos")))]
mod logind;

#[cfg(windows)]
pub use execution_state::ExecutionStateInhibitor;
#[cfg(unix)]
pub use held::HeldProcessInhibitor;
#[cfg(all(unix, not(target_os = "macos")))]
pub use logind::LogindInhibitor;

use gpuwake_core::{Decision, InhibitError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sets the OS "keep the system awake" level.
pub trait SleepInhibitor: Send + Sync + std::fmt::Debug + 'static {
    fn apply(&self, decision: Decision) -> impl Future<Output = Result<(), InhibitError>> + Send;
}

/// Best stay-awake mechanism for the running OS.
#[cfg(windows)]
pub type PlatformInhibitor = ExecutionStateInhibitor;
#[cfg(target_os = "macos")]
pub type PlatformInhibitor = HeldProcessInhibitor;
#[cfg(all(unix, not(target_os = "macos")))]
pub type PlatformInhibitor = LogindInhibitor;
#[cfg(not(any(windows, unix)))]
pub type PlatformInhibitor = LogOnlyInhibitor;

#[cfg(windows)]
pub fn platform_inhibitor() -> PlatformInhibitor {
    ExecutionStateInhibitor
}

#[cfg(target_os = "macos")]
pub fn platform_inhibitor() -> PlatformInhibitor {
    HeldProcessInhibitor::caffeinate()
}

#[cfg(all(unix, not(target_os = "macos")))]
pub fn platform_inhibitor() -> PlatformInhibitor {
    LogindInhibitor::default()
}

#[cfg(not(any(windows, unix)))]
pub fn platform_inhibitor() -> PlatformInhibitor {
    LogOnlyInhibitor::default()
}

/// Records decisions in the log without touching the OS.  Used where no
/// stay-awake mechanism is known.
#[derive(Debug, Default)]
pub struct LogOnlyInhibitor {
    asserted: AtomicBool,
}

impl SleepInhibitor for LogOnlyInhibitor {
    async fn apply(&self, decision: Decision) -> Result<(), InhibitError> {
        let assert = decision == Decision::Assert;
        if self.asserted.swap(assert, Ordering::Relaxed) != assert {
            tracing::info!("Stay-awake level (log only): {decision:?}");
        }
        Ok(())
    }
}
