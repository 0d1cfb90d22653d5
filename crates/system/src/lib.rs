//! OS-facing pieces: GPU sampling, idle-timeout lookup, stay-awake control.

mod command;
pub mod idle;
pub mod inhibit;
pub mod nvidia;

pub use idle::{query_idle_timeout, resolve_threshold};
pub use inhibit::{platform_inhibitor, LogOnlyInhibitor, PlatformInhibitor, SleepInhibitor};
pub use nvidia::{parse_usage, GpuSampler, NvidiaSmi};
