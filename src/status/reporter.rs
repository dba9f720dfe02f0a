use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::TimeUntilReset;
use crate::tracker::QuotaTracker;

use super::snapshot::QuotaStatus;

/// Read-only projection over a shared [`QuotaTracker`].
///
/// This is the surface handed to display and API layers: it adds no state
/// of its own and never writes through to the persisted record.
#[derive(Clone)]
pub struct StatusReporter {
    tracker: Arc<QuotaTracker>,
}

impl StatusReporter {
    pub fn new(tracker: Arc<QuotaTracker>) -> Self {
        Self { tracker }
    }

    pub fn quota_status(&self) -> QuotaStatus {
        self.tracker.quota_status()
    }

    pub fn quota_status_at(&self, now: DateTime<Utc>) -> QuotaStatus {
        self.tracker.quota_status_at(now)
    }

    pub fn time_until_reset(&self) -> TimeUntilReset {
        self.tracker.time_until_reset()
    }

    pub fn time_until_reset_at(&self, now: DateTime<Utc>) -> TimeUntilReset {
        self.tracker.time_until_reset_at(now)
    }
}
