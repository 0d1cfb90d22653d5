use gpuwake_core::{Result, WakeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure parsed from `gpuwake.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WakeConfig {
    /// How and how often the GPU is queried.
    pub sampler: SamplerConfig,
    /// Rolling history settings.
    pub history: HistoryConfig,
    /// Grace period settings.
    pub idle: IdleConfig,
    /// Optional JSON status file for external displays.
    pub status: StatusConfig,
    /// Logging defaults (overridden by `RUST_LOG`).
    pub log: LogConfig,
}

impl WakeConfig {
    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sampler.command.trim().is_empty() {
            return Err(invalid("sampler.command", "must name an executable"));
        }
        if self.sampler.interval_ms == 0 {
            return Err(invalid("sampler.interval_ms", "must be greater than 0"));
        }
        if self.sampler.timeout_ms == 0 {
            return Err(invalid("sampler.timeout_ms", "must be greater than 0"));
        }
        if self.history.capacity == 0 {
            return Err(invalid("history.capacity", "must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> WakeError {
    WakeError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// GPU query command settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Executable to run.
    pub command: String,
    /// Arguments requesting `index, utilization` as bare CSV.
    pub args: Vec<String>,
    /// Kill the query if it runs longer than this.
    pub timeout_ms: u64,
    /// Pause between the end of one cycle and the start of the next.
    pub interval_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            command: default_command().to_string(),
            args: vec![
                "--query-gpu=index,utilization.gpu".to_string(),
                "--format=csv,noheader,nounits".to_string(),
            ],
            timeout_ms:  5_000,
            interval_ms: 1_000,
        }
    }
}

#[cfg(windows)]
fn default_command() -> &'static str {
    r"C:\Windows\System32\nvidia-smi.exe"
}

#[cfg(not(windows))]
fn default_command() -> &'static str {
    "nvidia-smi"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples kept per device.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: gpuwake_core::DEFAULT_CAPACITY,
        }
    }
}

/// Grace period configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Fixed grace period; when set the OS is not queried.
    pub threshold_secs: Option<u64>,
    /// Used when the OS query fails.
    pub fallback_secs: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            threshold_secs: None,
            fallback_secs:  gpuwake_core::DEFAULT_IDLE_THRESHOLD_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatusConfig {
    /// Where to write the JSON snapshot after every cycle.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: WakeConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, WakeConfig::default());
        assert_eq!(cfg.sampler.interval_ms, 1_000);
        assert_eq!(cfg.history.capacity, 60);
        assert_eq!(cfg.idle.fallback_secs, 300);
        assert!(cfg.idle.threshold_secs.is_none());
    }

    #[test]
    fn defaults_are_valid() {
        assert!(WakeConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_and_capacity_are_rejected() {
        let cfg: WakeConfig = toml::from_str("[sampler]\ninterval_ms = 0").unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(WakeError::Invalid { field: "sampler.interval_ms", .. })
        ));

        let cfg: WakeConfig = toml::from_str("[history]\ncapacity = 0").unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(WakeError::Invalid { field: "history.capacity", .. })
        ));

        let cfg: WakeConfig = toml::from_str("[sampler]\ncommand = \"  \"").unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(WakeError::Invalid { field: "sampler.command", .. })
        ));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: WakeConfig = toml::from_str(
            r#"
            [sampler]
            command = "/opt/nvidia/bin/nvidia-smi"
            timeout_ms = 2000

            [idle]
            threshold_secs = 900

            [status]
            path = "/run/user/1000/gpuwake.json"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.sampler.command, "/opt/nvidia/bin/nvidia-smi");
        assert_eq!(cfg.sampler.timeout_ms, 2_000);
        assert_eq!(cfg.sampler.args.len(), 2);
        assert_eq!(cfg.idle.threshold_secs, Some(900));
        assert_eq!(
            cfg.status.path.as_deref(),
            Some(std::path::Path::new("/run/user/1000/gpuwake.json"))
        );
        assert_eq!(cfg.log.level, "info");
    }
}
