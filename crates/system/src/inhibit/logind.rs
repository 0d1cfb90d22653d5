use super::SleepInhibitor;
use gpuwake_core::{Decision, InhibitError};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};
use zbus::zvariant::OwnedFd;
use zbus::{Connection, Proxy};

const LOGIND_DESTINATION: &str = "org.freedesktop.login1";
const LOGIND_PATH: &str = "/org/freedesktop/login1";
const LOGIND_MANAGER: &str = "org.freedesktop.login1.Manager";

/// Holds a logind inhibitor lock (`Manager.Inhibit`) while asserted.
///
/// logind keeps the lock for as long as the returned file descriptor is
/// open, so releasing is just closing it; nothing is left behind if the
/// daemon dies.
#[derive(Debug, Default)]
pub struct LogindInhibitor {
    connection: OnceCell<Connection>,
    lock:       Mutex<Option<OwnedFd>>,
}

/// `(what, who, why, mode)` for `Manager.Inhibit`.
pub(crate) fn inhibit_args() -> (&'static str, &'static str, &'static str, &'static str) {
    ("idle:sleep", "gpuwake", "GPU is busy", "block")
}

fn logind_error(e: zbus::Error) -> InhibitError {
    InhibitError::Logind(e.to_string())
}

impl LogindInhibitor {
    async fn take_lock(&self) -> Result<OwnedFd, InhibitError> {
        let connection = self
            .connection
            .get_or_try_init(Connection::system)
            .await
            .map_err(logind_error)?;
        let manager = Proxy::new(connection, LOGIND_DESTINATION, LOGIND_PATH, LOGIND_MANAGER)
            .await
            .map_err(logind_error)?;
        manager
            .call("Inhibit", &inhibit_args())
            .await
            .map_err(logind_error)
    }

    /// Whether an inhibitor lock is currently held.
    pub async fn is_holding(&self) -> bool {
        self.lock.lock().await.is_some()
    }
}

impl SleepInhibitor for LogindInhibitor {
    async fn apply(&self, decision: Decision) -> Result<(), InhibitError> {
        let mut held = self.lock.lock().await;
        match decision {
            Decision::Assert if held.is_none() => {
                *held = Some(self.take_lock().await?);
                info!("Holding logind {} inhibitor lock", inhibit_args().0);
            }
            Decision::Assert => debug!("logind inhibitor lock already held"),
            Decision::Release => {
                // Closing the descriptor drops the lock.
                if held.take().is_some() {
                    info!("Released logind inhibitor lock");
                }
            }
        }
        Ok(())
    }
}
