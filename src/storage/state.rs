use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Width of the rolling rate window, in seconds.
pub const MINUTE_WINDOW_SECS: i64 = 60;

/// The single on-disk representation of tracked usage.
///
/// `daily` maps each resource to the number of requests recorded since the
/// last daily reset; `minute` holds the timestamps of requests inside the
/// trailing window, in insertion (= chronological) order. Both maps
/// tolerate absent keys, and unknown extra fields are ignored, so older
/// records stay readable. A record that fails to parse outright is treated
/// as corrupt and reinitialized by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageState {
    #[serde(default)]
    pub daily: BTreeMap<String, u64>,
    #[serde(default)]
    pub minute: BTreeMap<String, Vec<DateTime<Utc>>>,
    #[serde(rename = "lastReset")]
    pub last_reset: DateTime<Utc>,
}

impl UsageState {
    /// Zeroed counters and empty windows for every known resource.
    pub fn initial<I, S>(resources: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut daily = BTreeMap::new();
        let mut minute = BTreeMap::new();
        for resource in resources {
            let resource = resource.into();
            daily.insert(resource.clone(), 0);
            minute.insert(resource, Vec::new());
        }
        Self {
            daily,
            minute,
            last_reset: now,
        }
    }

    /// Requests recorded today for `resource`; an untracked key is zero
    /// usage, not an error.
    pub fn daily_used(&self, resource: &str) -> u64 {
        self.daily.get(resource).copied().unwrap_or(0)
    }

    /// Requests currently inside the rolling window. Only meaningful after
    /// [`prune_minute_window`](Self::prune_minute_window).
    pub fn minute_used(&self, resource: &str) -> u64 {
        self.minute.get(resource).map_or(0, |events| events.len() as u64)
    }

    /// Count one request against `resource` at `now`.
    pub fn record(&mut self, resource: &str, now: DateTime<Utc>) {
        let count = self.daily.entry(resource.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        self.minute.entry(resource.to_string()).or_default().push(now);
    }

    /// Drop window entries at or before `now - 60s`, and any stamped after
    /// `now` (clock skew).
    pub fn prune_minute_window(&mut self, resource: &str, now: DateTime<Utc>) {
        if let Some(events) = self.minute.get_mut(resource) {
            let cutoff = now - Duration::seconds(MINUTE_WINDOW_SECS);
            events.retain(|event| *event > cutoff && *event <= now);
        }
    }

    pub fn prune_all_windows(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(MINUTE_WINDOW_SECS);
        for events in self.minute.values_mut() {
            events.retain(|event| *event > cutoff && *event <= now);
        }
    }

    /// Zero every daily counter and stamp the reset instant. Minute windows
    /// are left alone; they expire on their own.
    pub fn reset_daily(&mut self, now: DateTime<Utc>) {
        for count in self.daily.values_mut() {
            *count = 0;
        }
        self.last_reset = now;
    }
}
