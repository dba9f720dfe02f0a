use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Usage against one limit window (daily or trailing-minute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowStatus {
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
    /// Round-half-up integer percentage. Exceeds 100 when usage overran the
    /// limit; a zero limit reads as fully used.
    pub percent: u64,
}

impl WindowStatus {
    pub fn new(used: u64, limit: u64) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
            percent: percent_used(used, limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
    pub daily: WindowStatus,
    pub minute: WindowStatus,
}

/// Point-in-time snapshot across every configured resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub resources: BTreeMap<String, ResourceStatus>,
    pub next_reset: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

fn percent_used(used: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 100;
    }
    // round(100 * used / limit), half away from zero.
    (used * 200 + limit) / (limit * 2)
}
