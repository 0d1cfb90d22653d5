pub mod schema;
pub mod watcher;

pub use schema::{HistoryConfig, IdleConfig, LogConfig, SamplerConfig, StatusConfig, WakeConfig};
pub use watcher::ConfigWatcher;

use gpuwake_core::{Result, WakeError};
use std::path::{Path, PathBuf};

/// Load and validate configuration from a TOML file.  Returns
/// `WakeConfig::default()` if the file doesn't exist so the daemon always has
/// sensible defaults; a file that exists but is unreadable, malformed or
/// out of range is an error.
pub fn load(path: impl AsRef<Path>) -> Result<WakeConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(WakeConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| WakeError::Config(format!("cannot read '{}': {e}", path.display())))?;

    let config: WakeConfig = toml::from_str(&raw)
        .map_err(|e| WakeError::Config(format!("TOML parse error in '{}': {e}", path.display())))?;
    config.validate()?;
    tracing::debug!("Loaded config from '{}'", path.display());
    Ok(config)
}

/// Return the default config path: `%APPDATA%\gpuwake\gpuwake.toml` on
/// Windows, otherwise honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    config_dir().join("gpuwake").join("gpuwake.toml")
}

#[cfg(windows)]
fn config_dir() -> PathBuf {
    std::env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(not(windows))]
fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load("/nonexistent/gpuwake/gpuwake.toml").unwrap();
        assert_eq!(cfg, WakeConfig::default());
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let path = std::env::temp_dir().join(format!("gpuwake-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[sampler\ncommand = ").unwrap();
        let err = load(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, WakeError::Config(_)));
    }

    #[test]
    fn out_of_range_value_fails_to_load() {
        let path = std::env::temp_dir().join(format!("gpuwake-zero-{}.toml", std::process::id()));
        std::fs::write(&path, "[sampler]\ninterval_ms = 0\n").unwrap();
        let err = load(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, WakeError::Invalid { field: "sampler.interval_ms", .. }));
    }

    #[test]
    fn default_path_ends_with_file_name() {
        assert!(default_path().ends_with("gpuwake/gpuwake.toml"));
    }
}
