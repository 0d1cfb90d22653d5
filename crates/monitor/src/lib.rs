//! Sampling cycle and its periodic driver.

pub mod cycle;
pub mod status;

pub use cycle::{CycleReport, Monitor, TickOutcome};
pub use status::StatusWriter;

use gpuwake_core::MonitorSnapshot;
use gpuwake_system::{GpuSampler, SleepInhibitor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handle to the background sampling task.
pub struct MonitorHandle<S, I> {
    monitor:   Arc<Monitor<S, I>>,
    stop:      watch::Sender<bool>,
    snapshots: watch::Receiver<MonitorSnapshot>,
    task:      JoinHandle<()>,
}

/// Spawn a background Tokio task that runs a sampling cycle, waits
/// `interval`, and repeats.
///
/// The pause starts when a cycle ends, so a slow GPU query delays the next
/// cycle instead of overlapping it.  After every cycle the fresh snapshot is
/// published to subscribers and, if configured, to the status file.
///
/// The task stops when [`MonitorHandle::shutdown`] is called or the handle is
/// dropped.
pub fn spawn<S: GpuSampler, I: SleepInhibitor>(
    monitor: Arc<Monitor<S, I>>,
    interval: Duration,
    status: Option<StatusWriter>,
) -> MonitorHandle<S, I> {
    let (stop, mut stop_rx) = watch::channel(false);
    let (snap_tx, snapshots) = watch::channel(monitor.snapshot());

    let task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    outcome = monitor.tick() => {
                        if let TickOutcome::Ran(_) = outcome {
                            let snapshot = monitor.snapshot();
                            if let Some(writer) = &status {
                                if let Err(e) = writer.write(&snapshot).await {
                                    warn!("Cannot write status file '{}': {e}", writer.path().display());
                                }
                            }
                            snap_tx.send_replace(snapshot);
                        }
                    }
                }

                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            monitor.begin_shutdown();
            monitor.release().await;
        }
    });

    MonitorHandle {
        monitor,
        stop,
        snapshots,
        task,
    }
}

impl<S: GpuSampler, I: SleepInhibitor> MonitorHandle<S, I> {
    pub fn monitor(&self) -> &Arc<Monitor<S, I>> {
        &self.monitor
    }

    /// Latest snapshot, updated after every completed cycle.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshots.clone()
    }

    /// Stop scheduling cycles and hand sleep control back to the OS.
    ///
    /// A cycle still waiting on the GPU query is cancelled, which kills the
    /// query process.  If the task does not wind down within `grace` it is
    /// aborted.
    pub async fn shutdown(self, grace: Duration) {
        info!("Stopping GPU monitor");
        self.monitor.begin_shutdown();
        let _ = self.stop.send(true);

        let mut task = self.task;
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            warn!("Monitor task did not stop within {grace:?}; aborting");
            task.abort();
        }

        self.monitor.release().await;
    }
}
