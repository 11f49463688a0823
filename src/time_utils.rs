// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and quota window boundaries.

use chrono::{DateTime, Duration, DurationRound, SecondsFormat, TimeZone, Timelike, Utc};

/// Length of Strava's short rate-limit window, in minutes.
pub const SHORT_WINDOW_MINUTES: u32 = 15;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Next quarter-hour mark strictly after `now` (:00, :15, :30, :45).
///
/// A mark at minute 60 rolls into the next hour.
pub fn next_quarter_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let minute_start = now
        .duration_trunc(Duration::minutes(1))
        .unwrap_or(now);
    let minute = now.minute();
    let next_mark = (minute / SHORT_WINDOW_MINUTES + 1) * SHORT_WINDOW_MINUTES;
    minute_start + Duration::minutes(i64::from(next_mark - minute))
}

/// Midnight UTC of the day after `now`.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default())
}
