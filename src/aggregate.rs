//! Day-bucket aggregation and formatting helpers
//!
//! Pure functions over a service's entry sequence, shared by the dashboard
//! and the notifier.

use crate::history::HistoryEntry;
use crate::service::Status;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of day buckets the dashboard always receives.
pub const DEFAULT_WINDOW_DAYS: usize = 90;

/// Resolved status of one calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Online,
    Offline,
    Placeholder,
}

/// Aggregation of all observations for one service on one UTC calendar day.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DayBucket {
    pub date: Option<NaiveDate>,
    pub online: u32,
    pub offline: u32,
    pub status: DayStatus,
    pub durations: Vec<f64>,
}

impl DayBucket {
    fn placeholder() -> Self {
        Self {
            date: None,
            online: 0,
            offline: 0,
            status: DayStatus::Placeholder,
            durations: Vec::new(),
        }
    }
}

/// Fold a service's full history into exactly `days` day buckets.
///
/// Days are UTC calendar days, ascending. The window keeps the oldest
/// `days` distinct days and right-pads with placeholders so callers always
/// get a fixed-size sequence. A day is offline if any offline observation
/// was recorded that day; any other observation counts toward the online
/// tally.
pub fn day_buckets(entries: &[HistoryEntry], days: usize) -> Vec<DayBucket> {
    let mut by_day: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for entry in entries {
        let date = entry.timestamp.date_naive();
        let bucket = by_day.entry(date).or_insert_with(|| DayBucket {
            date: Some(date),
            online: 0,
            offline: 0,
            status: DayStatus::Online,
            durations: Vec::new(),
        });

        if entry.status == Status::Offline {
            bucket.offline += 1;
            bucket.status = DayStatus::Offline;
            if let Some(duration) = entry.duration {
                bucket.durations.push(duration);
            }
        } else {
            bucket.online += 1;
        }
    }

    let mut buckets: Vec<DayBucket> = by_day.into_values().take(days).collect();
    while buckets.len() < days {
        buckets.push(DayBucket::placeholder());
    }
    buckets
}

/// Whole-history uptime percentage, rounded to two decimals. Only online
/// observations count as up; an empty history is 0.
pub fn uptime_percentage(entries: &[HistoryEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }

    let online = entries
        .iter()
        .filter(|entry| entry.status == Status::Online)
        .count();
    let percentage = online as f64 / entries.len() as f64 * 100.0;
    (percentage * 100.0).round() / 100.0
}

/// Render a duration as its largest whole unit: "45 seconds", "1 minute",
/// "2 hours", "3 days". Units are never combined.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{} seconds", seconds.floor() as i64)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor() as i64;
        format!("{} minute{}", minutes, if minutes > 1 { "s" } else { "" })
    } else if seconds < 86400.0 {
        let hours = (seconds / 3600.0).floor() as i64;
        format!("{} hour{}", hours, if hours > 1 { "s" } else { "" })
    } else {
        let days = (seconds / 86400.0).floor() as i64;
        format!("{} day{}", days, if days > 1 { "s" } else { "" })
    }
}

/// Coarse "N units ago" rendering for the dashboard's lastUpdated line.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("{} minute{} ago", minutes, if minutes == 1 { "" } else { "s" })
    } else if seconds <= 10 {
        "just now".to_string()
    } else {
        format!("{} seconds ago", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(status: Status, secs: i64) -> HistoryEntry {
        HistoryEntry::new(status, Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn closed_entry(secs: i64, duration: f64) -> HistoryEntry {
        let mut entry = entry(Status::Offline, secs);
        entry.duration = Some(duration);
        entry
    }

    const DAY: i64 = 86400;

    #[test]
    fn test_fixed_size_ascending_with_tail_padding() {
        let entries = vec![
            entry(Status::Online, 0),
            entry(Status::Online, DAY),
            entry(Status::Offline, 2 * DAY),
        ];

        let buckets = day_buckets(&entries, 90);
        assert_eq!(buckets.len(), 90);

        let real: Vec<_> = buckets.iter().filter(|b| b.date.is_some()).collect();
        assert_eq!(real.len(), 3);
        for pair in real.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }

        // placeholders only at the tail
        assert!(buckets[3..]
            .iter()
            .all(|b| b.status == DayStatus::Placeholder && b.date.is_none()));
    }

    #[test]
    fn test_day_is_offline_if_any_offline_observation() {
        let entries = vec![
            entry(Status::Online, 0),
            entry(Status::Offline, 100),
            entry(Status::Online, 200),
        ];

        let buckets = day_buckets(&entries, 1);
        assert_eq!(buckets[0].status, DayStatus::Offline);
        assert_eq!(buckets[0].online, 2);
        assert_eq!(buckets[0].offline, 1);
    }

    #[test]
    fn test_maintenance_observations_count_online() {
        let entries = vec![entry(Status::Maintenance, 0), entry(Status::Maintenance, 100)];

        let buckets = day_buckets(&entries, 1);
        assert_eq!(buckets[0].status, DayStatus::Online);
        assert_eq!(buckets[0].online, 2);
    }

    #[test]
    fn test_durations_collected_on_their_day() {
        let entries = vec![
            closed_entry(0, 300.0),
            entry(Status::Online, 300),
            closed_entry(DAY, 60.0),
            entry(Status::Online, DAY + 60),
        ];

        let buckets = day_buckets(&entries, 2);
        assert_eq!(buckets[0].durations, vec![300.0]);
        assert_eq!(buckets[1].durations, vec![60.0]);
    }

    #[test]
    fn test_window_keeps_oldest_days() {
        let entries: Vec<_> = (0..5)
            .map(|day| entry(Status::Online, day * DAY))
            .collect();

        let buckets = day_buckets(&entries, 3);
        assert_eq!(buckets.len(), 3);
        assert_eq!(
            buckets[0].date,
            Some(Utc.timestamp_opt(0, 0).unwrap().date_naive())
        );
        assert_eq!(
            buckets[2].date,
            Some(Utc.timestamp_opt(2 * DAY, 0).unwrap().date_naive())
        );
    }

    #[test]
    fn test_uptime_percentage() {
        assert_eq!(uptime_percentage(&[]), 0.0);

        let entries = vec![
            entry(Status::Online, 0),
            entry(Status::Online, 1),
            entry(Status::Online, 2),
            entry(Status::Offline, 3),
        ];
        assert_eq!(uptime_percentage(&entries), 75.0);

        let entries = vec![
            entry(Status::Online, 0),
            entry(Status::Online, 1),
            entry(Status::Offline, 2),
        ];
        assert_eq!(uptime_percentage(&entries), 66.67);
    }

    #[test]
    fn test_maintenance_counts_toward_total_only() {
        let entries = vec![entry(Status::Online, 0), entry(Status::Maintenance, 1)];
        assert_eq!(uptime_percentage(&entries), 50.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45.0), "45 seconds");
        assert_eq!(format_duration(90.0), "1 minute");
        assert_eq!(format_duration(7200.0), "2 hours");
        assert_eq!(format_duration(259_200.0), "3 days");
        assert_eq!(format_duration(0.4), "0 seconds");
        assert_eq!(format_duration(86_399.0), "23 hours");
    }

    #[test]
    fn test_relative_time() {
        let base = Utc.timestamp_opt(1_000_000, 0).unwrap();

        assert_eq!(relative_time(base, base + chrono::Duration::seconds(5)), "just now");
        assert_eq!(
            relative_time(base, base + chrono::Duration::seconds(30)),
            "30 seconds ago"
        );
        assert_eq!(
            relative_time(base, base + chrono::Duration::minutes(1)),
            "1 minute ago"
        );
        assert_eq!(
            relative_time(base, base + chrono::Duration::hours(3)),
            "3 hours ago"
        );
        assert_eq!(
            relative_time(base, base + chrono::Duration::days(1)),
            "1 day ago"
        );
    }
}
