// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mirror of Strava's read quota.
//!
//! Strava reports usage for two windows on every response: a short window
//! that resets every quarter hour and a long window that resets at UTC
//! midnight. The limiter never counts requests itself; it only stores the
//! last numbers the server reported and the instants at which they reset.

use crate::time_utils::{next_quarter_hour, next_utc_midnight};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Extra time slept past a reset instant before calling Strava again.
const RESET_SAFETY_MARGIN: Duration = Duration::from_secs(1);

const READ_LIMIT_HEADER: &str = "x-readratelimit-limit";
const READ_USAGE_HEADER: &str = "x-readratelimit-usage";
const LIMIT_HEADER: &str = "x-ratelimit-limit";
const USAGE_HEADER: &str = "x-ratelimit-usage";

/// Which quota window, if any, is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    None,
    ShortWindowExceeded,
    LongWindowExceeded,
}

/// Quota numbers reported on a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaReport {
    pub short_usage: u32,
    pub short_ceiling: u32,
    pub long_usage: u32,
    pub long_ceiling: u32,
}

impl QuotaReport {
    /// Parse Strava's `"short,long"` quota headers.
    ///
    /// Read-specific headers win over the overall ones. Returns `None` if
    /// neither pair is present and well formed.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Self::from_header_pair(headers, READ_USAGE_HEADER, READ_LIMIT_HEADER)
            .or_else(|| Self::from_header_pair(headers, USAGE_HEADER, LIMIT_HEADER))
    }

    fn from_header_pair(headers: &HeaderMap, usage: &str, limit: &str) -> Option<Self> {
        let (short_usage, long_usage) = parse_pair(headers.get(usage)?.to_str().ok()?)?;
        let (short_ceiling, long_ceiling) = parse_pair(headers.get(limit)?.to_str().ok()?)?;
        Some(Self {
            short_usage,
            short_ceiling,
            long_usage,
            long_ceiling,
        })
    }
}

fn parse_pair(value: &str) -> Option<(u32, u32)> {
    let (short, long) = value.split_once(',')?;
    Some((short.trim().parse().ok()?, long.trim().parse().ok()?))
}

/// State of one quota window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateWindow {
    pub ceiling: u32,
    pub usage: u32,
    pub resets_at: Option<DateTime<Utc>>,
}

impl RateWindow {
    fn exhausted(&self) -> bool {
        self.ceiling > 0 && self.usage >= self.ceiling
    }
}

#[derive(Debug, Default)]
struct WindowState {
    short: RateWindow,
    long: RateWindow,
}

/// Dual-window rate limiter shared by every Strava call in the process.
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create an uninitialized limiter; it does not block until Strava
    /// has reported quota numbers at least once.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite both windows with the numbers from a response observed
    /// at `observed_at`.
    pub fn report(&self, quota: QuotaReport, observed_at: DateTime<Utc>) {
        let short_reset = next_quarter_hour(observed_at);
        let long_reset = next_utc_midnight(observed_at);

        let mut state = self.lock();
        state.short = RateWindow {
            ceiling: quota.short_ceiling,
            usage: quota.short_usage,
            resets_at: Some(short_reset),
        };
        state.long = RateWindow {
            ceiling: quota.long_ceiling,
            usage: quota.long_usage,
            resets_at: Some(long_reset),
        };
        drop(state);

        tracing::debug!(
            short_usage = quota.short_usage,
            short_ceiling = quota.short_ceiling,
            long_usage = quota.long_usage,
            long_ceiling = quota.long_ceiling,
            short_reset = %short_reset,
            long_reset = %long_reset,
            "Updated Strava rate limit state"
        );
    }

    /// Most restrictive exhausted window.
    ///
    /// The long window is reported first: there is no point resuming at
    /// the next quarter hour if the day is used up.
    pub fn check(&self) -> LimitKind {
        let state = self.lock();

        if state.short.ceiling == 0 && state.long.ceiling == 0 {
            return LimitKind::None;
        }
        if state.long.exhausted() {
            return LimitKind::LongWindowExceeded;
        }
        if state.short.exhausted() {
            return LimitKind::ShortWindowExceeded;
        }
        LimitKind::None
    }

    /// Snapshot of the short and long windows.
    pub fn windows(&self) -> (RateWindow, RateWindow) {
        let state = self.lock();
        (state.short, state.long)
    }

    /// Replace both windows, reset instants included.
    ///
    /// Used to carry limiter state across a restart, where the reset
    /// instants Strava implied are already known.
    pub fn restore(&self, short: RateWindow, long: RateWindow) {
        let mut state = self.lock();
        state.short = short;
        state.long = long;
    }

    /// Time left until `kind` resets (plus the safety margin), measured
    /// from `now`. `None` if there is nothing to wait for.
    pub fn wait_duration(&self, kind: LimitKind, now: DateTime<Utc>) -> Option<Duration> {
        let resets_at = {
            let state = self.lock();
            match kind {
                LimitKind::None => return None,
                LimitKind::ShortWindowExceeded => state.short.resets_at,
                LimitKind::LongWindowExceeded => state.long.resets_at,
            }
        }?;

        if resets_at <= now {
            return None;
        }
        let remaining = (resets_at - now).to_std().ok()?;
        Some(remaining + RESET_SAFETY_MARGIN)
    }

    /// Sleep until the window named by `kind` has reset.
    pub async fn await_reset(&self, kind: LimitKind) {
        let Some(wait) = self.wait_duration(kind, Utc::now()) else {
            return;
        };

        tracing::info!(
            limit = ?kind,
            wait_secs = wait.as_secs(),
            "Strava rate limit exceeded, waiting for reset"
        );
        tokio::time::sleep(wait).await;
        tracing::info!(limit = ?kind, "Rate limit reset, resuming Strava requests");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
    }

    fn quota(short_usage: u32, long_usage: u32) -> QuotaReport {
        QuotaReport {
            short_usage,
            short_ceiling: 300,
            long_usage,
            long_ceiling: 3000,
        }
    }

    #[test]
    fn test_uninitialized_never_blocks() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.check(), LimitKind::None);
    }

    #[test]
    fn test_zero_ceilings_never_block() {
        let limiter = RateLimiter::new();
        limiter.report(
            QuotaReport {
                short_usage: 10,
                short_ceiling: 0,
                long_usage: 10,
                long_ceiling: 0,
            },
            at(9, 0),
        );
        assert_eq!(limiter.check(), LimitKind::None);
    }

    #[test]
    fn test_under_quota() {
        let limiter = RateLimiter::new();
        limiter.report(quota(299, 2999), at(9, 0));
        assert_eq!(limiter.check(), LimitKind::None);
    }

    #[test]
    fn test_short_window_exceeded() {
        let limiter = RateLimiter::new();
        limiter.report(quota(300, 1200), at(9, 0));
        assert_eq!(limiter.check(), LimitKind::ShortWindowExceeded);
    }

    #[test]
    fn test_long_window_takes_precedence() {
        let limiter = RateLimiter::new();
        limiter.report(quota(300, 3000), at(9, 0));
        assert_eq!(limiter.check(), LimitKind::LongWindowExceeded);
    }

    #[test]
    fn test_report_overwrites_previous_state() {
        let limiter = RateLimiter::new();
        limiter.report(quota(300, 100), at(9, 0));
        limiter.report(quota(5, 101), at(9, 16));
        assert_eq!(limiter.check(), LimitKind::None);

        let (short, long) = limiter.windows();
        assert_eq!(short.usage, 5);
        assert_eq!(long.usage, 101);
    }

    #[test]
    fn test_reset_instants() {
        let limiter = RateLimiter::new();
        limiter.report(quota(1, 1), at(9, 50));

        let (short, long) = limiter.windows();
        assert_eq!(short.resets_at, Some(at(10, 0)));
        assert_eq!(
            long.resets_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_wait_duration_includes_margin() {
        let limiter = RateLimiter::new();
        limiter.report(quota(300, 1), at(9, 10));

        let wait = limiter
            .wait_duration(LimitKind::ShortWindowExceeded, at(9, 14))
            .unwrap();
        assert_eq!(wait, Duration::from_secs(61));
    }

    #[test]
    fn test_wait_duration_none_when_reset_passed() {
        let limiter = RateLimiter::new();
        limiter.report(quota(300, 1), at(9, 10));

        assert!(limiter
            .wait_duration(LimitKind::ShortWindowExceeded, at(9, 20))
            .is_none());
        assert!(limiter.wait_duration(LimitKind::None, at(9, 11)).is_none());
    }

    #[test]
    fn test_restore_keeps_given_reset_instants() {
        let limiter = RateLimiter::new();
        let long = RateWindow {
            ceiling: 3000,
            usage: 3000,
            resets_at: Some(at(12, 0)),
        };
        limiter.restore(RateWindow::default(), long);

        assert_eq!(limiter.check(), LimitKind::LongWindowExceeded);
        assert_eq!(
            limiter.wait_duration(LimitKind::LongWindowExceeded, at(11, 59)),
            Some(Duration::from_secs(61))
        );
    }

    #[tokio::test]
    async fn test_await_reset_returns_when_reset_in_past() {
        let limiter = RateLimiter::new();
        limiter.report(quota(300, 3000), at(9, 10));

        tokio::time::timeout(
            Duration::from_secs(1),
            limiter.await_reset(LimitKind::LongWindowExceeded),
        )
        .await
        .expect("reset in the past must not block");
    }

    #[test]
    fn test_quota_from_read_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-ReadRateLimit-Limit", HeaderValue::from_static("100,1000"));
        headers.insert("X-ReadRateLimit-Usage", HeaderValue::from_static("12,345"));
        headers.insert("X-RateLimit-Limit", HeaderValue::from_static("200,2000"));
        headers.insert("X-RateLimit-Usage", HeaderValue::from_static("1,2"));

        assert_eq!(
            QuotaReport::from_headers(&headers),
            Some(QuotaReport {
                short_usage: 12,
                short_ceiling: 100,
                long_usage: 345,
                long_ceiling: 1000,
            })
        );
    }

    #[test]
    fn test_quota_falls_back_to_overall_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Limit", HeaderValue::from_static("200, 2000"));
        headers.insert("X-RateLimit-Usage", HeaderValue::from_static("7, 70"));

        let report = QuotaReport::from_headers(&headers).unwrap();
        assert_eq!(report.short_usage, 7);
        assert_eq!(report.long_ceiling, 2000);
    }

    #[test]
    fn test_quota_missing_or_garbled_headers() {
        let mut headers = HeaderMap::new();
        assert!(QuotaReport::from_headers(&headers).is_none());

        headers.insert("X-ReadRateLimit-Limit", HeaderValue::from_static("abc"));
        headers.insert("X-ReadRateLimit-Usage", HeaderValue::from_static("1,2"));
        assert!(QuotaReport::from_headers(&headers).is_none());
    }
}
