use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::Serialize;

/// Hours west of UTC for the reference timezone that defines the daily
/// boundary. Fixed offset, never DST-adjusted.
const REFERENCE_OFFSET_HOURS: i32 = 8;

/// Decides when a new quota day has begun and where the next boundary lies.
///
/// All comparisons convert instants into the fixed reference offset and
/// look at the calendar date there; the instants themselves stay UTC.
#[derive(Debug, Clone, Copy)]
pub struct ResetClock {
    offset: FixedOffset,
}

impl Default for ResetClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ResetClock {
    pub fn new() -> Self {
        let offset = FixedOffset::west_opt(REFERENCE_OFFSET_HOURS * 3600)
            .expect("reference offset is within +/-24h");
        Self { offset }
    }

    /// True iff the calendar date of `now` in the reference offset differs
    /// from that of `last_reset`. A `now` earlier than `last_reset` (clock
    /// skew) never triggers a reset.
    pub fn should_reset(&self, last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if now < last_reset {
            return false;
        }
        now.with_timezone(&self.offset).date_naive()
            != last_reset.with_timezone(&self.offset).date_naive()
    }

    /// The next midnight in the reference offset, as a UTC instant.
    pub fn next_reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next_midnight = now
            .with_timezone(&self.offset)
            .date_naive()
            .succ_opt()
            .expect("calendar date is nowhere near the representable maximum")
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time of day");
        self.offset
            .from_local_datetime(&next_midnight)
            .single()
            .expect("fixed offsets map local times uniquely")
            .with_timezone(&Utc)
    }

    /// Time remaining until the next boundary, clamped at zero under clock
    /// skew.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> TimeUntilReset {
        let reset_time = self.next_reset_at(now);
        let total_ms = (reset_time - now).num_milliseconds().max(0);
        TimeUntilReset {
            hours: total_ms / 3_600_000,
            minutes: (total_ms % 3_600_000) / 60_000,
            total_ms,
            reset_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeUntilReset {
    pub hours: i64,
    pub minutes: i64,
    #[serde(rename = "totalMilliseconds")]
    pub total_ms: i64,
    #[serde(rename = "resetTime")]
    pub reset_time: DateTime<Utc>,
}
