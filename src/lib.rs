//! Per-model request quota tracking.
//!
//! This crate enforces a rolling sixty-second rate limit and a daily cap
//! per tracked resource (typically a model name), persists usage as a JSON
//! record under the per-user configuration directory, and reports remaining
//! capacity together with the time until the next daily reset. The daily
//! boundary is midnight at a fixed UTC-8 offset, never DST-adjusted.
//!
//! Construct a [`QuotaTracker`] once at startup from a [`QuotaConfig`] and
//! share it behind an `Arc`; hand a [`StatusReporter`] to anything that only
//! needs to display usage.

pub mod clock;
pub mod config;
pub mod status;
pub mod storage;
pub mod tracker;

pub use clock::{ResetClock, TimeUntilReset};
pub use config::{QuotaConfig, ResourceLimit};
pub use status::{QuotaStatus, ResourceStatus, StatusReporter, WindowStatus};
pub use storage::{StorageError, UsageState, UsageStore};
pub use tracker::{Decision, QuotaTracker, Refusal};
