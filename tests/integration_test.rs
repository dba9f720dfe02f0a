use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use model_quota::{
    QuotaConfig, QuotaTracker, Refusal, ResourceLimit, StatusReporter, UsageStore,
};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid RFC 3339 timestamp")
}

fn config_in(dir: &Path, limits: &[(&str, u64, u64)]) -> QuotaConfig {
    let limits: HashMap<String, ResourceLimit> = limits
        .iter()
        .map(|(key, per_minute, per_day)| {
            (
                key.to_string(),
                ResourceLimit {
                    max_per_minute: *per_minute,
                    max_per_day: *per_day,
                },
            )
        })
        .collect();
    QuotaConfig {
        data_dir: dir.to_path_buf(),
        limits,
        ..QuotaConfig::default()
    }
}

#[test]
fn test_check_record_cycle_up_to_the_rate_limit() {
    init_tracing();
    let temp = tempdir().expect("failed to create temp dir");
    let tracker = QuotaTracker::new(&config_in(temp.path(), &[("gemini-2.5-pro", 5, 25)]));
    let now = utc("2024-06-15T18:00:00Z");

    for _ in 0..5 {
        assert!(tracker.can_make_request_at("gemini-2.5-pro", now).is_allowed());
        tracker.record_request_at("gemini-2.5-pro", now);
    }

    let decision = tracker.can_make_request_at("gemini-2.5-pro", now);
    assert_eq!(
        decision.refusal(),
        Some(&Refusal::RateLimit { used: 5, limit: 5 })
    );

    // One second past the window's edge the first request ages out.
    let later = utc("2024-06-15T18:01:01Z");
    assert!(tracker.can_make_request_at("gemini-2.5-pro", later).is_allowed());
}

#[test]
fn test_daily_cap_outlasts_the_minute_window() {
    init_tracing();
    let temp = tempdir().expect("failed to create temp dir");
    let tracker = QuotaTracker::new(&config_in(temp.path(), &[("gemini-2.5-pro", 100, 3)]));

    for minute in 0..3 {
        let now = utc(&format!("2024-06-15T18:{:02}:00Z", 10 * minute));
        tracker.record_request_at("gemini-2.5-pro", now);
    }

    let decision = tracker.can_make_request_at("gemini-2.5-pro", utc("2024-06-15T19:00:00Z"));
    assert_eq!(
        decision.refusal(),
        Some(&Refusal::DailyLimit { used: 3, limit: 3 })
    );
}

#[test]
fn test_usage_survives_process_restart() {
    init_tracing();
    let temp = tempdir().expect("failed to create temp dir");
    let now = utc("2024-06-15T18:00:00Z");

    {
        let tracker = QuotaTracker::new(&config_in(temp.path(), &[("gemini-2.5-flash", 60, 1000)]));
        for _ in 0..4 {
            tracker.record_request_at("gemini-2.5-flash", now);
        }
    }

    // A new tracker over the same data directory sees the recorded usage.
    let tracker = QuotaTracker::new(&config_in(temp.path(), &[("gemini-2.5-flash", 60, 1000)]));
    let status = tracker.quota_status_at(utc("2024-06-15T18:00:30Z"));
    let flash = &status.resources["gemini-2.5-flash"];
    assert_eq!(flash.daily.used, 4);
    assert_eq!(flash.daily.remaining, 996);
    assert_eq!(flash.minute.used, 4);
}

#[test]
fn test_corrupt_record_reports_zero_usage() {
    init_tracing();
    let temp = tempdir().expect("failed to create temp dir");
    let store = UsageStore::new(temp.path(), vec!["gemini-2.5-pro".to_string()]);
    fs::write(store.path(), b"definitely not json").expect("failed to seed corrupt record");

    let tracker = QuotaTracker::new(&config_in(temp.path(), &[("gemini-2.5-pro", 5, 25)]));
    let status = tracker.quota_status_at(utc("2024-06-15T18:00:00Z"));

    let pro = &status.resources["gemini-2.5-pro"];
    assert_eq!(pro.daily.used, 0);
    assert_eq!(pro.daily.percent, 0);
    assert_eq!(pro.minute.used, 0);
}

#[test]
fn test_unknown_resource_refused_end_to_end() {
    init_tracing();
    let temp = tempdir().expect("failed to create temp dir");
    let tracker = QuotaTracker::new(&config_in(temp.path(), &[("gemini-2.5-pro", 5, 25)]));

    let decision = tracker.can_make_request_at("nonexistent-model", utc("2024-06-15T18:00:00Z"));
    assert_eq!(
        decision.refusal().map(Refusal::reason_code),
        Some("unknown-resource")
    );
}

#[test]
fn test_reporter_snapshot_and_countdown() {
    init_tracing();
    let temp = tempdir().expect("failed to create temp dir");
    let tracker = Arc::new(QuotaTracker::new(&config_in(
        temp.path(),
        &[("gemini-2.5-pro", 5, 25), ("gemini-2.5-flash", 60, 1000)],
    )));
    let reporter = StatusReporter::new(Arc::clone(&tracker));

    let now = utc("2024-06-15T18:00:00Z");
    tracker.record_request_at("gemini-2.5-pro", now);

    let status = reporter.quota_status_at(now);
    assert_eq!(status.resources.len(), 2);
    assert_eq!(status.resources["gemini-2.5-pro"].daily.used, 1);
    assert_eq!(status.resources["gemini-2.5-pro"].daily.percent, 4);
    assert_eq!(status.resources["gemini-2.5-flash"].daily.used, 0);
    // Next boundary: midnight at UTC-8 is 08:00 UTC the next day.
    assert_eq!(status.next_reset, utc("2024-06-16T08:00:00Z"));

    let remaining = reporter.time_until_reset_at(now);
    assert_eq!(remaining.hours, 14);
    assert_eq!(remaining.minutes, 0);
    assert_eq!(remaining.reset_time, status.next_reset);
}

#[test]
fn test_concurrent_records_lose_no_updates() {
    init_tracing();
    let temp = tempdir().expect("failed to create temp dir");
    let tracker = Arc::new(QuotaTracker::new(&config_in(
        temp.path(),
        &[("gemini-2.5-flash", 1000, 10000)],
    )));
    let now = utc("2024-06-15T18:00:00Z");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    tracker.record_request_at("gemini-2.5-flash", now);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("recording thread panicked");
    }

    let status = tracker.quota_status_at(now);
    assert_eq!(status.resources["gemini-2.5-flash"].daily.used, 40);
}
