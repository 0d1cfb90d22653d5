use super::SleepInhibitor;
use gpuwake_core::{Decision, InhibitError};
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Keeps the machine awake by holding a helper process open for as long as
/// the inhibition is asserted (`caffeinate -i`).
///
/// The helper is started as the leader of its own process group and
/// releasing kills the whole group, so anything the helper forked goes with
/// it.  A helper is only forgotten once the kill has succeeded.
#[derive(Debug)]
pub struct HeldProcessInhibitor {
    program: String,
    args:    Vec<String>,
    child:   Mutex<Option<Child>>,
}

impl HeldProcessInhibitor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: Mutex::new(None),
        }
    }

    /// macOS idle-sleep assertion.
    pub fn caffeinate() -> Self {
        Self::new("caffeinate", vec!["-i".to_string()])
    }

    fn hold(&self) -> Result<(), InhibitError> {
        let mut slot = self.child.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(child) = slot.as_mut() {
            match child.try_wait() {
                Ok(None) => return Ok(()),
                Ok(Some(status)) => warn!("{} exited early ({status}); restarting", self.program),
                Err(e) => warn!("Cannot poll {}: {e}; restarting", self.program),
            }
            // The leader is gone but its group may not be.
            kill_group(child).map_err(InhibitError::Kill)?;
            *slot = None;
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| InhibitError::Spawn {
                command: self.program.clone(),
                source,
            })?;

        info!("Holding sleep inhibitor {} (pgid {})", self.program, child.id());
        *slot = Some(child);
        Ok(())
    }

    fn drop_hold(&self) -> Result<(), InhibitError> {
        let mut slot = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(child) = slot.as_mut() else {
            return Ok(());
        };

        kill_group(child).map_err(InhibitError::Kill)?;
        *slot = None;
        info!("Released sleep inhibitor {}", self.program);
        Ok(())
    }

    /// Whether a helper process is currently held.
    pub fn is_holding(&self) -> bool {
        self.child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// SIGKILL every process in the group led by `child`, then reap the leader.
/// An already empty group counts as success.
fn kill_group(child: &mut Child) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: killpg takes plain integers; pgid is the group we created.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
        debug!("Process group {pgid} already gone");
    }
    child.wait().map(drop)
}

impl SleepInhibitor for HeldProcessInhibitor {
    async fn apply(&self, decision: Decision) -> Result<(), InhibitError> {
        match decision {
            Decision::Assert => self.hold(),
            Decision::Release => self.drop_hold(),
        }
    }
}

impl Drop for HeldProcessInhibitor {
    fn drop(&mut self) {
        if let Err(e) = self.drop_hold() {
            warn!("Failed to release sleep inhibitor on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sleeper() -> HeldProcessInhibitor {
        HeldProcessInhibitor::new("sleep", vec!["30".to_string()])
    }

    #[tokio::test]
    async fn assert_is_idempotent() {
        let inhibitor = sleeper();
        inhibitor.apply(Decision::Assert).await.unwrap();
        let pid = inhibitor.child.lock().unwrap().as_ref().map(Child::id);

        inhibitor.apply(Decision::Assert).await.unwrap();
        let pid_again = inhibitor.child.lock().unwrap().as_ref().map(Child::id);
        assert_eq!(pid, pid_again);

        inhibitor.apply(Decision::Release).await.unwrap();
        assert!(!inhibitor.is_holding());
    }

    #[tokio::test]
    async fn release_without_hold_is_fine() {
        let inhibitor = sleeper();
        inhibitor.apply(Decision::Release).await.unwrap();
        inhibitor.apply(Decision::Release).await.unwrap();
        assert!(!inhibitor.is_holding());
    }

    #[tokio::test]
    async fn missing_helper_is_a_spawn_error() {
        let inhibitor = HeldProcessInhibitor::new("gpuwake-no-such-helper", vec![]);
        let err = inhibitor.apply(Decision::Assert).await.unwrap_err();
        assert!(matches!(err, InhibitError::Spawn { .. }));
        assert!(!inhibitor.is_holding());
    }

    /// Running (not reaped, not a zombie) according to procfs.
    #[cfg(target_os = "linux")]
    fn running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => !stat.contains(") Z "),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn release_kills_processes_the_helper_forked() {
        let pid_file = std::env::temp_dir().join(format!("gpuwake-held-{}.pid", std::process::id()));
        let _ = std::fs::remove_file(&pid_file);
        let script = format!("sleep 4242 & echo $! > '{}'; wait", pid_file.display());
        let inhibitor = HeldProcessInhibitor::new("sh", vec!["-c".to_string(), script]);

        inhibitor.apply(Decision::Assert).await.unwrap();

        let mut forked = None;
        for _ in 0..100 {
            if let Some(pid) = std::fs::read_to_string(&pid_file)
                .ok()
                .and_then(|raw| raw.trim().parse::<u32>().ok())
            {
                forked = Some(pid);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = std::fs::remove_file(&pid_file);
        let forked = forked.expect("helper never reported its child");
        assert!(running(forked));

        inhibitor.apply(Decision::Release).await.unwrap();
        assert!(!inhibitor.is_holding());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!running(forked), "pid {forked} outlived the release");
    }

    #[tokio::test]
    async fn helper_that_exits_on_its_own_is_restarted() {
        let inhibitor = HeldProcessInhibitor::new("true", vec![]);
        inhibitor.apply(Decision::Assert).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The exited leader is reaped and replaced without error.
        inhibitor.apply(Decision::Assert).await.unwrap();
        assert!(inhibitor.is_holding());
        inhibitor.apply(Decision::Release).await.unwrap();
        assert!(!inhibitor.is_holding());
    }
}
