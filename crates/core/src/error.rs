use thiserror::Error;

/// Top-level error type used across the workspace.
#[derive(Debug, Error)]
pub enum WakeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T, E = WakeError> = std::result::Result<T, E>;

/// Failure of a single GPU query.  Always recovered locally: the cycle that
/// hit it observes zero devices.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("cannot launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    Exit {
        command: String,
        status:  String,
        stderr:  String,
    },

    #[error("'{command}' did not finish within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("unparseable output: {0}")]
    Output(String),
}

/// The OS idle-sleep timeout could not be determined.
#[derive(Debug, Error)]
pub enum IdleTimeoutQueryError {
    #[error("cannot run '{command}': {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected output from '{command}': {detail}")]
    Parse { command: String, detail: String },

    #[error("idle timeout query is not supported on this platform")]
    Unsupported,
}

/// The OS rejected a stay-awake level change.
#[derive(Debug, Error)]
pub enum InhibitError {
    #[error("SetThreadExecutionState rejected flags {0:#x}")]
    ExecutionState(u32),

    #[error("cannot spawn inhibitor '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot stop inhibitor process: {0}")]
    Kill(#[source] std::io::Error),

    #[error("logind inhibit call failed: {0}")]
    Logind(String),
}
