use super::SleepInhibitor;
use gpuwake_core::{Decision, InhibitError};
use windows::Win32::System::Power::{
    SetThreadExecutionState, ES_CONTINUOUS, ES_SYSTEM_REQUIRED, EXECUTION_STATE,
};

/// `SetThreadExecutionState` wrapper.
///
/// `Assert` resets the system idle timer without forcing the display on;
/// it is a one-shot reset, so it must be reissued every cycle.  `Release`
/// clears any continuous requirement and hands control back to the power plan.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionStateInhibitor;

impl SleepInhibitor for ExecutionStateInhibitor {
    async fn apply(&self, decision: Decision) -> Result<(), InhibitError> {
        let flags: EXECUTION_STATE = match decision {
            Decision::Assert => ES_SYSTEM_REQUIRED,
            Decision::Release => ES_CONTINUOUS,
        };

        // SAFETY: plain Win32 call with a valid flag combination; no pointers.
        let previous = unsafe { SetThreadExecutionState(flags) };
        if previous.0 == 0 {
            return Err(InhibitError::ExecutionState(flags.0));
        }
        Ok(())
    }
}
