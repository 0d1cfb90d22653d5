//! OS idle-sleep timeout lookup.
//!
//! The grace period after GPU activity is sized to the user's own sleep
//! setting.  Lookup happens once at startup and again on config reload.

use crate::command::{self, RunError};
use gpuwake_core::IdleTimeoutQueryError;
use std::time::Duration;
use tracing::{info, warn};

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SUB_SLEEP` power setting subgroup.
#[cfg_attr(not(windows), allow(dead_code))]
const SUB_SLEEP: &str = "238c9fa8-0aad-41ed-83f4-97be242c8f20";
/// `STANDBYIDLE` ("Sleep after") setting.
#[cfg_attr(not(windows), allow(dead_code))]
const STANDBY_IDLE: &str = "29f6c1db-86da-48c5-9fdb-f2b67b1f44da";

/// Resolve the grace period: a configured override wins, otherwise ask the OS
/// and fall back to `fallback_secs` when that fails.
pub async fn resolve_threshold(override_secs: Option<u64>, fallback_secs: u64) -> u64 {
    if let Some(secs) = override_secs {
        info!("Using configured idle threshold of {secs}s");
        return secs;
    }

    match query_idle_timeout().await {
        Ok(secs) => {
            info!("OS idle-sleep timeout is {secs}s");
            secs
        }
        Err(e) => {
            warn!("Cannot read OS idle-sleep timeout ({e}); assuming {fallback_secs}s");
            fallback_secs
        }
    }
}

/// Ask the active power plan how many idle seconds pass before sleep (AC).
#[cfg(windows)]
pub async fn query_idle_timeout() -> Result<u64, IdleTimeoutQueryError> {
    let scheme_out = run_text("powercfg", &["/getactivescheme"]).await?;
    let scheme = parse_active_scheme(&scheme_out).ok_or_else(|| IdleTimeoutQueryError::Parse {
        command: "powercfg /getactivescheme".to_string(),
        detail:  "no scheme GUID".to_string(),
    })?;

    let query_out = run_text("powercfg", &["/q", scheme, SUB_SLEEP, STANDBY_IDLE]).await?;
    parse_ac_timeout(&query_out).ok_or_else(|| IdleTimeoutQueryError::Parse {
        command: "powercfg /q".to_string(),
        detail:  "no 'Current AC Power Setting Index' line".to_string(),
    })
}

/// Read GNOME's AC sleep-inactivity timeout.
#[cfg(target_os = "linux")]
pub async fn query_idle_timeout() -> Result<u64, IdleTimeoutQueryError> {
    let out = run_text(
        "gsettings",
        &[
            "get",
            "org.gnome.settings-daemon.plugins.power",
            "sleep-inactive-ac-timeout",
        ],
    )
    .await?;
    parse_gsettings_uint(&out).ok_or_else(|| IdleTimeoutQueryError::Parse {
        command: "gsettings".to_string(),
        detail:  format!("expected an integer, got {:?}", out.trim()),
    })
}

#[cfg(not(any(windows, target_os = "linux")))]
pub async fn query_idle_timeout() -> Result<u64, IdleTimeoutQueryError> {
    Err(IdleTimeoutQueryError::Unsupported)
}

#[cfg_attr(not(any(windows, target_os = "linux")), allow(dead_code))]
async fn run_text(program: &str, args: &[&str]) -> Result<String, IdleTimeoutQueryError> {
    let output = command::run(program, args, QUERY_TIMEOUT)
        .await
        .map_err(|e| IdleTimeoutQueryError::Command {
            command: program.to_string(),
            source:  match e {
                RunError::Launch(source) => source,
                RunError::Timeout => std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
            },
        })?;

    if !output.status.success() {
        return Err(IdleTimeoutQueryError::Parse {
            command: program.to_string(),
            detail:  format!("exited with {}: {}", output.status, command::stderr_summary(&output)),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract the GUID from `Power Scheme GUID: <guid>  (Balanced)`.
pub fn parse_active_scheme(output: &str) -> Option<&str> {
    let (_, rest) = output.split_once("GUID:")?;
    rest.split_whitespace().next()
}

/// Extract seconds from the `Current AC Power Setting Index: 0x…` line.
pub fn parse_ac_timeout(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix("Current AC Power Setting Index:")?;
        let hex = value.trim().strip_prefix("0x")?;
        u64::from_str_radix(hex, 16).ok()
    })
}

/// `gsettings` prints GVariant text such as `int32 1200` or `uint32 0`.
pub fn parse_gsettings_uint(output: &str) -> Option<u64> {
    output.split_whitespace().last()?.parse().ok()
}
