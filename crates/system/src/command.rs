use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Why a helper command produced no usable output.
#[derive(Debug)]
pub(crate) enum RunError {
    Launch(std::io::Error),
    Timeout,
}

/// Run `program` to completion, capturing stdout and stderr.
///
/// The child is killed if `timeout` elapses or the returned future is
/// dropped, so a hung tool can never outlive the cycle that started it.
pub(crate) async fn run<S: AsRef<str>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<Output, RunError> {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(AsRef::as_ref))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

    let child = cmd.spawn().map_err(RunError::Launch)?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(RunError::Launch),
        Err(_) => Err(RunError::Timeout),
    }
}

/// First line of stderr, for error messages.
pub(crate) fn stderr_summary(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}
