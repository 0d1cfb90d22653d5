use crate::command::{self, RunError};
use gpuwake_core::{SamplingError, UsageSample};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Source of per-device utilization readings.
pub trait GpuSampler: Send + Sync + 'static {
    /// Query every device once.  Order follows the device order reported by
    /// the underlying tool.
    fn sample(&self) -> impl Future<Output = Result<Vec<UsageSample>, SamplingError>> + Send;
}

/// Samples NVIDIA GPUs through `nvidia-smi`'s CSV query interface.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    command: String,
    args:    Vec<String>,
    timeout: Duration,
}

impl NvidiaSmi {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl GpuSampler for NvidiaSmi {
    async fn sample(&self) -> Result<Vec<UsageSample>, SamplingError> {
        let output = command::run(&self.command, &self.args, self.timeout)
            .await
            .map_err(|e| match e {
                RunError::Launch(source) => SamplingError::Launch {
                    command: self.command.clone(),
                    source,
                },
                RunError::Timeout => SamplingError::Timeout {
                    command:    self.command.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                },
            })?;

        if !output.status.success() {
            return Err(SamplingError::Exit {
                command: self.command.clone(),
                status:  output.status.to_string(),
                stderr:  command::stderr_summary(&output),
            });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| SamplingError::Output(format!("not UTF-8: {e}")))?;

        let samples = parse_usage(&stdout);
        if samples.is_empty() && stdout.lines().any(|l| !l.trim().is_empty()) {
            return Err(SamplingError::Output(format!(
                "no '<index>, <percent>' lines in {:?}",
                truncate(&stdout, 120)
            )));
        }
        Ok(samples)
    }
}

/// Parse `index, utilization` CSV lines.
///
/// Lines that do not split into exactly two fields, or whose second field is
/// not a non-negative integer, are skipped.  Values above 100 are clamped.
pub fn parse_usage(output: &str) -> Vec<UsageSample> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_line(line);
            if parsed.is_none() {
                debug!("Skipping malformed GPU line: {line:?}");
            }
            parsed
        })
        .collect()
}

fn parse_line(line: &str) -> Option<UsageSample> {
    let mut fields = line.split(',');
    let (Some(index), Some(usage), None) = (fields.next(), fields.next(), fields.next()) else {
        return None;
    };

    let index = index.trim();
    if index.is_empty() {
        return None;
    }
    let usage = usage.trim().parse::<u32>().ok()?;
    Some(UsageSample::new(index, usage.min(100) as u8))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
