use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{ResetClock, TimeUntilReset};
use crate::config::{QuotaConfig, ResourceLimit};
use crate::status::{QuotaStatus, ResourceStatus, WindowStatus};
use crate::storage::{UsageState, UsageStore};

use super::decision::{Decision, Refusal};

/// Admission control and usage accounting for a fixed set of resources.
///
/// Construct once at startup and share behind an `Arc`. Every operation is
/// a fresh load of the persisted record under the internal mutex; no
/// in-memory copy outlives a call, so two concurrent records cannot read
/// the same pre-increment counter.
///
/// A resource is never flagged as blocked anywhere; whether it is blocked
/// falls out of its counters and the clock on every check.
pub struct QuotaTracker {
    store: Mutex<UsageStore>,
    clock: ResetClock,
    limits: HashMap<String, ResourceLimit>,
    persist_pruned_on_check: bool,
}

impl QuotaTracker {
    pub fn new(config: &QuotaConfig) -> Self {
        let resources: Vec<String> = config.limits.keys().cloned().collect();
        Self {
            store: Mutex::new(UsageStore::new(config.data_dir.clone(), resources)),
            clock: ResetClock::new(),
            limits: config.limits.clone(),
            persist_pruned_on_check: config.persist_pruned_on_check,
        }
    }

    /// May one request against `resource` proceed right now?
    ///
    /// Callers are expected to check and then [`record_request`]
    /// separately; the gap between the two is an accepted race across
    /// process boundaries.
    ///
    /// [`record_request`]: Self::record_request
    pub fn can_make_request(&self, resource: &str) -> Decision {
        self.can_make_request_at(resource, Utc::now())
    }

    pub fn can_make_request_at(&self, resource: &str, now: DateTime<Utc>) -> Decision {
        let store = self.lock_store();
        let mut state = store.load(now);
        self.apply_daily_reset(&store, &mut state, now);

        state.prune_minute_window(resource, now);
        if self.persist_pruned_on_check {
            self.persist(&store, &state, "prune");
        }

        let Some(limit) = self.limits.get(resource).copied() else {
            debug!(resource, "admission refused for unknown resource");
            return Decision::Refused(Refusal::UnknownResource {
                resource: resource.to_string(),
            });
        };

        let daily_used = state.daily_used(resource);
        if daily_used >= limit.max_per_day {
            return Decision::Refused(Refusal::DailyLimit {
                used: daily_used,
                limit: limit.max_per_day,
            });
        }

        let minute_used = state.minute_used(resource);
        if minute_used >= limit.max_per_minute {
            return Decision::Refused(Refusal::RateLimit {
                used: minute_used,
                limit: limit.max_per_minute,
            });
        }

        Decision::Allowed
    }

    /// Count one request against `resource` and persist the full record.
    ///
    /// Does not re-check limits; a persistence failure is logged and the
    /// in-memory result stands.
    pub fn record_request(&self, resource: &str) {
        self.record_request_at(resource, Utc::now());
    }

    pub fn record_request_at(&self, resource: &str, now: DateTime<Utc>) {
        if !self.limits.contains_key(resource) {
            warn!(resource, "ignoring record for unknown resource");
            return;
        }

        let store = self.lock_store();
        let mut state = store.load(now);
        self.apply_daily_reset(&store, &mut state, now);

        state.record(resource, now);
        state.prune_minute_window(resource, now);
        self.persist(&store, &state, "record");

        debug!(
            resource,
            daily_used = state.daily_used(resource),
            minute_used = state.minute_used(resource),
            "recorded request"
        );
    }

    /// Usage snapshot for every configured resource.
    ///
    /// This is the read path behind [`StatusReporter`]: a due daily reset
    /// is applied to the view only, and pruning stays in memory; nothing
    /// is written back. The persisted record catches up on the next check
    /// or record.
    ///
    /// [`StatusReporter`]: crate::status::StatusReporter
    pub fn quota_status(&self) -> QuotaStatus {
        self.quota_status_at(Utc::now())
    }

    pub fn quota_status_at(&self, now: DateTime<Utc>) -> QuotaStatus {
        let mut state = {
            let store = self.lock_store();
            store.load(now)
        };

        if self.clock.should_reset(state.last_reset, now) {
            state.reset_daily(now);
        }
        state.prune_all_windows(now);

        let mut resources = BTreeMap::new();
        for (resource, limit) in &self.limits {
            resources.insert(
                resource.clone(),
                ResourceStatus {
                    daily: WindowStatus::new(state.daily_used(resource), limit.max_per_day),
                    minute: WindowStatus::new(state.minute_used(resource), limit.max_per_minute),
                },
            );
        }

        QuotaStatus {
            resources,
            next_reset: self.clock.next_reset_at(now),
            last_updated: now,
        }
    }

    pub fn time_until_reset(&self) -> TimeUntilReset {
        self.time_until_reset_at(Utc::now())
    }

    pub fn time_until_reset_at(&self, now: DateTime<Utc>) -> TimeUntilReset {
        self.clock.time_until_reset(now)
    }

    /// Zero the daily counters and persist immediately when a new day has
    /// begun in the reference timezone. Runs on every state-loading
    /// operation, whichever resource triggered it; within one day it is a
    /// no-op after the first firing.
    fn apply_daily_reset(&self, store: &UsageStore, state: &mut UsageState, now: DateTime<Utc>) {
        if !self.clock.should_reset(state.last_reset, now) {
            return;
        }
        state.reset_daily(now);
        info!(reset_at = %now, "daily quota counters reset");
        self.persist(store, state, "reset");
    }

    fn persist(&self, store: &UsageStore, state: &UsageState, operation: &str) {
        if let Err(err) = store.save(state) {
            warn!(
                operation,
                error = %err,
                "failed to persist usage record, continuing with in-memory state"
            );
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, UsageStore> {
        // A poisoned mutex only means another thread panicked mid-call; the
        // store holds no cross-call state, so the guard stays usable.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
