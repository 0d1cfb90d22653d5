pub mod controller;
pub mod error;
pub mod history;
pub mod recency;
pub mod state;

pub use controller::{Decision, Evaluation, InhibitionController, DEFAULT_IDLE_THRESHOLD_SECS};
pub use error::{IdleTimeoutQueryError, InhibitError, Result, SamplingError, WakeError};
pub use history::{HistoryStore, DEFAULT_CAPACITY};
pub use recency::classify;
pub use state::{DeviceHistory, MonitorSnapshot, UsageSample};
