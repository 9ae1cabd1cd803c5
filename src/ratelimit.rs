use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Calls granted to a placeholder snapshot.
pub const PLACEHOLDER_CALLS: i32 = 1_000_000;
/// How far in the future a placeholder snapshot resets.
pub const PLACEHOLDER_TTL_SECS: i64 = 60 * 60;

/// Which "now" the reset estimate was measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAnchor {
    /// Server `Date` header, in epoch seconds.
    ServerDate(i64),
    /// No server date was supplied; local capture time was used.
    LocalCapture,
    /// A server date was supplied but could not be parsed; local capture time was used.
    MalformedServerDate,
}

/// Point-in-time rate-limit observation with a skew-corrected reset estimate.
///
/// The counters and the server reset epoch never change after construction.
/// Only the derived reset date (and its anchor) is refreshed by
/// [`RateLimitSnapshot::recalculate_reset_date`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSnapshot {
    limit: i32,
    remaining: i32,
    reset_epoch_seconds: i64,
    created_at_epoch_seconds: i64,
    reset_date: DateTime<Utc>,
    anchor: ResetAnchor,
}

impl RateLimitSnapshot {
    /// Build a snapshot from a response, capturing the local time from the system clock.
    ///
    /// `updated_at` is the response `Date` header (RFC 1123), if any.
    pub fn new(
        limit: i32,
        remaining: i32,
        reset_epoch_seconds: i64,
        updated_at: Option<&str>,
    ) -> Self {
        Self::with_clock(
            limit,
            remaining,
            reset_epoch_seconds,
            updated_at,
            &SystemClock,
        )
    }

    pub fn with_clock(
        limit: i32,
        remaining: i32,
        reset_epoch_seconds: i64,
        updated_at: Option<&str>,
        clock: &dyn Clock,
    ) -> Self {
        let created_at_epoch_seconds = clock.epoch_seconds();
        let mut snapshot = Self {
            limit,
            remaining,
            reset_epoch_seconds,
            created_at_epoch_seconds,
            reset_date: epoch_to_datetime(reset_epoch_seconds),
            anchor: ResetAnchor::LocalCapture,
        };
        snapshot.recalculate_reset_date(updated_at);
        snapshot
    }

    /// Long-lived stand-in used before any real observation exists, so that
    /// repeated status lookups do not trigger speculative fetches.
    pub fn placeholder() -> Self {
        Self::placeholder_with_clock(&SystemClock)
    }

    pub fn placeholder_with_clock(clock: &dyn Clock) -> Self {
        let reset = clock.epoch_seconds().saturating_add(PLACEHOLDER_TTL_SECS);
        Self::with_clock(PLACEHOLDER_CALLS, PLACEHOLDER_CALLS, reset, None, clock)
    }

    /// Re-derive the reset date against `updated_at` (the server's RFC 1123 `Date`).
    ///
    /// The server's distance to reset is measured against the server's own "now"
    /// and re-applied to the local capture time. With agreeing clocks this is
    /// exact; otherwise it errs towards "not yet reset". A missing, blank or
    /// malformed date falls back to the local capture time.
    pub fn recalculate_reset_date(&mut self, updated_at: Option<&str>) -> DateTime<Utc> {
        let (reference, anchor) = match updated_at.map(str::trim).filter(|s| !s.is_empty()) {
            None => (self.created_at_epoch_seconds, ResetAnchor::LocalCapture),
            Some(raw) => match parse_http_date(raw) {
                Some(secs) => (secs, ResetAnchor::ServerDate(secs)),
                None => {
                    debug!(
                        "Malformed Date header value {:?}; using local capture time",
                        raw
                    );
                    (
                        self.created_at_epoch_seconds,
                        ResetAnchor::MalformedServerDate,
                    )
                }
            },
        };

        let seconds_until_reset = self.reset_epoch_seconds.saturating_sub(reference);
        self.reset_date =
            epoch_to_datetime(self.created_at_epoch_seconds.saturating_add(seconds_until_reset));
        self.anchor = anchor;
        self.reset_date
    }

    pub fn remaining(&self) -> i32 {
        self.remaining
    }

    pub fn limit(&self) -> i32 {
        self.limit
    }

    /// Raw, uncorrected reset time as declared by the server.
    pub fn reset_epoch_seconds(&self) -> i64 {
        self.reset_epoch_seconds
    }

    /// Skew-corrected instant at which the window has or will reset.
    pub fn reset_date(&self) -> DateTime<Utc> {
        self.reset_date
    }

    pub fn created_at_epoch_seconds(&self) -> i64 {
        self.created_at_epoch_seconds
    }

    pub fn anchor(&self) -> ResetAnchor {
        self.anchor
    }

    /// Server clock minus local clock at capture, when a server date was used.
    pub fn clock_skew(&self) -> Option<Duration> {
        match self.anchor {
            ResetAnchor::ServerDate(server) => Some(Duration::seconds(
                server.saturating_sub(self.created_at_epoch_seconds),
            )),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.limit == PLACEHOLDER_CALLS && self.remaining == PLACEHOLDER_CALLS
    }

    /// True once the corrected reset date lies strictly in the past.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with(&SystemClock)
    }

    pub fn is_expired_with(&self, clock: &dyn Clock) -> bool {
        self.reset_date < clock.now()
    }
}

impl PartialEq for RateLimitSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.remaining == other.remaining
            && self.limit == other.limit
            && self.reset_epoch_seconds == other.reset_epoch_seconds
            && self.reset_date == other.reset_date
    }
}

impl Eq for RateLimitSnapshot {}

impl Hash for RateLimitSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.remaining.hash(state);
        self.limit.hash(state);
        self.reset_epoch_seconds.hash(state);
        self.reset_date.hash(state);
    }
}

impl fmt::Display for RateLimitSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "remaining={} limit={} reset={}",
            self.remaining,
            self.limit,
            self.reset_date.to_rfc3339()
        )
    }
}

/// Parse an HTTP `Date` header (RFC 1123, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.timestamp())
}

fn epoch_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(if secs < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use std::collections::hash_map::DefaultHasher;

    const T: i64 = 1_700_000_000;

    fn http_date(secs: i64) -> String {
        epoch_to_datetime(secs)
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }

    fn hash_of(s: &RateLimitSnapshot) -> u64 {
        let mut h = DefaultHasher::new();
        s.hash(&mut h);
        h.finish()
    }

    #[test]
    fn accessors_echo_constructor_arguments() {
        let clock = FixedClock::at_epoch(T);
        let s = RateLimitSnapshot::with_clock(5000, 4321, T + 600, None, &clock);
        assert_eq!(s.limit(), 5000);
        assert_eq!(s.remaining(), 4321);
        assert_eq!(s.reset_epoch_seconds(), T + 600);
        assert_eq!(s.created_at_epoch_seconds(), T);
    }

    #[test]
    fn nonsensical_values_are_accepted() {
        let clock = FixedClock::at_epoch(T);
        let s = RateLimitSnapshot::with_clock(-1, -5, T - 10_000, None, &clock);
        assert_eq!(s.limit(), -1);
        assert_eq!(s.remaining(), -5);
        assert!(s.is_expired_with(&clock));
    }

    #[test]
    fn server_clock_ahead_moves_reset_earlier() {
        let clock = FixedClock::at_epoch(T);
        let date = http_date(T + 50);
        let s = RateLimitSnapshot::with_clock(5000, 10, T + 100, Some(&date), &clock);
        assert_eq!(s.reset_date().timestamp(), T + 50);
        assert_eq!(s.anchor(), ResetAnchor::ServerDate(T + 50));
        assert_eq!(s.clock_skew(), Some(Duration::seconds(50)));
        // raw value stays untouched
        assert_eq!(s.reset_epoch_seconds(), T + 100);
    }

    #[test]
    fn server_clock_behind_moves_reset_later() {
        let clock = FixedClock::at_epoch(T);
        let date = http_date(T - 30);
        let s = RateLimitSnapshot::with_clock(5000, 10, T + 100, Some(&date), &clock);
        assert_eq!(s.reset_date().timestamp(), T + 130);
        assert_eq!(s.clock_skew(), Some(Duration::seconds(-30)));
    }

    #[test]
    fn rfc1123_literal_is_understood() {
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(784_111_777)
        );
    }

    #[test]
    fn missing_date_uses_raw_reset() {
        let clock = FixedClock::at_epoch(T);
        let s = RateLimitSnapshot::with_clock(60, 59, T + 100, None, &clock);
        assert_eq!(s.reset_date().timestamp(), T + 100);
        assert_eq!(s.anchor(), ResetAnchor::LocalCapture);
        assert_eq!(s.clock_skew(), None);

        let blank = RateLimitSnapshot::with_clock(60, 59, T + 100, Some("   "), &clock);
        assert_eq!(blank.anchor(), ResetAnchor::LocalCapture);
        assert_eq!(blank, s);
    }

    #[test]
    fn malformed_date_matches_missing_date() {
        let clock = FixedClock::at_epoch(T);
        let none = RateLimitSnapshot::with_clock(60, 59, T + 100, None, &clock);
        let bad = RateLimitSnapshot::with_clock(60, 59, T + 100, Some("not-a-date"), &clock);
        assert_eq!(bad.reset_date(), none.reset_date());
        assert_eq!(bad.anchor(), ResetAnchor::MalformedServerDate);
    }

    #[test]
    fn reset_date_is_stable_and_unaffected_by_caller_changes() {
        let clock = FixedClock::at_epoch(T);
        let s = RateLimitSnapshot::with_clock(60, 59, T + 100, None, &clock);
        let mut first = s.reset_date();
        first = first + Duration::hours(5);
        assert_ne!(first, s.reset_date());
        assert_eq!(s.reset_date(), s.reset_date());
        assert_eq!(s.reset_date().timestamp(), T + 100);
    }

    #[test]
    fn recalculation_replaces_only_derived_date() {
        let clock = FixedClock::at_epoch(T);
        let mut s = RateLimitSnapshot::with_clock(60, 59, T + 100, None, &clock);
        let corrected = s.recalculate_reset_date(Some(&http_date(T + 20)));
        assert_eq!(corrected.timestamp(), T + 80);
        assert_eq!(s.reset_date(), corrected);
        assert_eq!(s.reset_epoch_seconds(), T + 100);
        assert_eq!(s.created_at_epoch_seconds(), T);
        assert_eq!(s.remaining(), 59);

        s.recalculate_reset_date(None);
        assert_eq!(s.reset_date().timestamp(), T + 100);
    }

    #[test]
    fn expiry_around_now() {
        let clock = FixedClock::at_epoch(T);
        let past = RateLimitSnapshot::with_clock(60, 0, T - 1, None, &clock);
        let future = RateLimitSnapshot::with_clock(60, 0, T + 1, None, &clock);
        let exact = RateLimitSnapshot::with_clock(60, 0, T, None, &clock);
        assert!(past.is_expired_with(&clock));
        assert!(!future.is_expired_with(&clock));
        assert!(!exact.is_expired_with(&clock));

        clock.advance(Duration::seconds(2));
        assert!(future.is_expired_with(&clock));
    }

    #[test]
    fn placeholder_survives_the_hour() {
        let clock = FixedClock::at_epoch(T);
        let p = RateLimitSnapshot::placeholder_with_clock(&clock);
        assert_eq!(p.limit(), PLACEHOLDER_CALLS);
        assert_eq!(p.remaining(), PLACEHOLDER_CALLS);
        assert_eq!(p.reset_epoch_seconds(), T + PLACEHOLDER_TTL_SECS);
        assert!(p.is_placeholder());

        clock.advance(Duration::seconds(PLACEHOLDER_TTL_SECS));
        assert!(!p.is_expired_with(&clock));
        clock.advance(Duration::seconds(1));
        assert!(p.is_expired_with(&clock));

        assert!(!RateLimitSnapshot::placeholder().is_expired());
    }

    #[test]
    fn equality_and_hash_follow_values() {
        let clock = FixedClock::at_epoch(T);
        let date = http_date(T + 5);
        let a = RateLimitSnapshot::with_clock(5000, 4999, T + 100, Some(&date), &clock);
        let b = RateLimitSnapshot::with_clock(5000, 4999, T + 100, Some(&date), &clock);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = RateLimitSnapshot::with_clock(5000, 4998, T + 100, Some(&date), &clock);
        assert_ne!(a, c);

        // without a server date the corrected value does not depend on capture time
        let d = RateLimitSnapshot::with_clock(5000, 4999, T + 100, None, &clock);
        clock.advance(Duration::seconds(7));
        let e = RateLimitSnapshot::with_clock(5000, 4999, T + 100, None, &clock);
        assert_eq!(d, e);
        assert_eq!(hash_of(&d), hash_of(&e));
    }

    #[test]
    fn extreme_values_clamp_instead_of_panicking() {
        let clock = FixedClock::at_epoch(T);
        let s = RateLimitSnapshot::with_clock(1, 1, i64::MAX, Some(&http_date(0)), &clock);
        assert_eq!(s.reset_date(), DateTime::<Utc>::MAX_UTC);
        let s = RateLimitSnapshot::with_clock(1, 1, i64::MIN, None, &clock);
        assert_eq!(s.reset_date(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn display_lists_counters_and_reset() {
        let clock = FixedClock::at_epoch(0);
        let s = RateLimitSnapshot::with_clock(60, 12, 3600, None, &clock);
        assert_eq!(
            s.to_string(),
            "remaining=12 limit=60 reset=1970-01-01T01:00:00+00:00"
        );
    }
}
