//! Time-window math for the stats aggregator and read-time formatting for
//! the activity feed. Everything here is pure: callers capture `now` once
//! and pass it in, so identical inputs always yield identical outputs.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// Inclusive [start, end] bounds for one aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Midnight UTC on the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    // date_naive().and_hms is always valid at 00:00:00.
    Utc.from_utc_datetime(
        &now.date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_else(|| now.naive_utc()),
    )
}

/// Midnight UTC on the first day of the month containing `now`.
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_else(|| now.naive_utc()))
}

/// `[startOfToday, now]`
pub fn today_window(now: DateTime<Utc>) -> WindowBounds {
    WindowBounds {
        start: start_of_day(now),
        end: now,
    }
}

/// `[now - 7 days, now]`
pub fn week_window(now: DateTime<Utc>) -> WindowBounds {
    WindowBounds {
        start: now - Duration::days(7),
        end: now,
    }
}

/// `[startOfMonth, now]`
pub fn month_window(now: DateTime<Utc>) -> WindowBounds {
    WindowBounds {
        start: start_of_month(now),
        end: now,
    }
}

/// Human-readable relative age for activity feed items.
///
/// Integer division on elapsed seconds, boundaries at 60s / 3600s / 86400s.
/// Negative elapsed time (clock skew) is clamped to "0 sec ago".
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created_at).num_seconds().max(0);
    if secs < 60 {
        format!("{secs} sec ago")
    } else if secs < 3600 {
        format!("{} min ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hr ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86400)
    }
}
