//! gpuwake: keeps the workstation awake while an NVIDIA GPU is busy.
//!
//! Run with:  `RUST_LOG=info gpuwake [path/to/gpuwake.toml]`

use anyhow::Result;
use gpuwake_config::{default_path, load as load_config, WakeConfig};
use gpuwake_monitor::{Monitor, StatusWriter};
use gpuwake_system::{platform_inhibitor, resolve_threshold, NvidiaSmi};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Upper bound on waiting for an in-flight cycle at exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_path);
    let loaded = load_config(&config_path);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // Structured logging; RUST_LOG wins over the config file (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("gpuwake v{} starting", env!("CARGO_PKG_VERSION"));
    if let Err(e) = &loaded {
        warn!("{e}; using defaults");
    }

    let threshold = resolve_threshold(config.idle.threshold_secs, config.idle.fallback_secs).await;

    let sampler = NvidiaSmi::new(
        config.sampler.command.clone(),
        config.sampler.args.clone(),
        Duration::from_millis(config.sampler.timeout_ms),
    );
    info!("Sampling '{}' every {} ms", sampler.command(), config.sampler.interval_ms);

    let monitor = Arc::new(Monitor::new(
        sampler,
        platform_inhibitor(),
        config.history.capacity,
        threshold,
    ));
    let status = config.status.path.clone().map(StatusWriter::new);
    let handle = gpuwake_monitor::spawn(
        monitor,
        Duration::from_millis(config.sampler.interval_ms),
        status,
    );

    let (_watcher, mut reloads) = gpuwake_config::ConfigWatcher::spawn(&config_path);
    let mut snapshots = handle.subscribe();
    let mut current = config;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(()) = reloads.recv() => {
                match load_config(&config_path) {
                    Ok(next) => {
                        let secs = resolve_threshold(next.idle.threshold_secs, next.idle.fallback_secs).await;
                        handle.monitor().refresh_threshold(secs);
                        if needs_restart(&current, &next) {
                            info!("Sampler, history and status settings take effect after a restart");
                        }
                        current = next;
                    }
                    Err(e) => warn!("Ignoring config change: {e}"),
                }
            }
            Ok(()) = snapshots.changed() => {
                let snap = snapshots.borrow_and_update();
                for device in &snap.devices {
                    if let Some(usage) = device.latest() {
                        debug!("GPU {}: {usage}%", device.device_id);
                    }
                }
                debug!(devices = snap.devices.len(), inhibiting = snap.inhibiting, "GPU: {}", snap.label);
            }
        }
    }

    handle.shutdown(SHUTDOWN_GRACE).await;
    info!("gpuwake stopped");
    Ok(())
}

/// Settings that are baked into the running monitor.
fn needs_restart(old: &WakeConfig, new: &WakeConfig) -> bool {
    old.sampler != new.sampler || old.history != new.history || old.status != new.status
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}
