//! Process-local fixed-window limiter guarding comment submission.
//!
//! Counters live only as long as the process; a restart forgets every client.
//! Concurrent requests for the same key near a window edge may over-admit by one.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowEntry {
    count: u32,
    resets_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub resets_at: OffsetDateTime,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self, now: OffsetDateTime) -> u64 {
        let seconds = (self.resets_at - now).whole_seconds().max(1);
        u64::try_from(seconds).unwrap_or(1)
    }
}

#[derive(Debug, Clone)]
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    entries: Arc<DashMap<String, WindowEntry>>,
}

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_at(identifier, OffsetDateTime::now_utc())
    }

    /// Admit or reject one request from `identifier` at `now`.
    ///
    /// Rejections do not count against the window.
    pub fn check_at(&self, identifier: &str, now: OffsetDateTime) -> RateLimitDecision {
        let mut entry = self
            .entries
            .entry(identifier.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                resets_at: now,
            });

        if entry.count == 0 || now >= entry.resets_at {
            *entry = WindowEntry {
                count: 1,
                resets_at: now + self.window,
            };
            return self.decision(true, &entry);
        }

        if entry.count >= self.limit {
            return self.decision(false, &entry);
        }

        entry.count += 1;
        self.decision(true, &entry)
    }

    fn decision(&self, allowed: bool, entry: &WindowEntry) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(entry.count),
            resets_at: entry.resets_at,
        }
    }

    /// Drop windows that have already expired.
    pub fn purge_expired(&self, now: OffsetDateTime) {
        self.entries.retain(|_, entry| entry.resets_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn admits_until_limit_then_rejects_without_counting() {
        let limiter = FixedWindowRateLimiter::new(3, Duration::from_millis(1000));
        let start = datetime!(2024-01-01 12:00:00 UTC);

        let remaining: Vec<u32> = (0..3)
            .map(|step| {
                let at = start + time::Duration::milliseconds(step * 100);
                let decision = limiter.check_at("1.2.3.4", at);
                assert!(decision.allowed);
                decision.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let rejected = limiter.check_at("1.2.3.4", start + time::Duration::milliseconds(500));
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.limit, 3);
        assert_eq!(rejected.resets_at, start + time::Duration::seconds(1));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = FixedWindowRateLimiter::new(3, Duration::from_millis(1000));
        let start = datetime!(2024-01-01 12:00:00 UTC);
        for _ in 0..4 {
            limiter.check_at("client", start);
        }

        let after = limiter.check_at("client", start + time::Duration::milliseconds(1000));
        assert!(after.allowed);
        assert_eq!(after.remaining, 2);
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        let now = datetime!(2024-01-01 12:00:00 UTC);
        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
    }

    #[test]
    fn purge_drops_expired_windows() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(1));
        let now = datetime!(2024-01-01 12:00:00 UTC);
        limiter.check_at("a", now);
        limiter.purge_expired(now + time::Duration::seconds(2));
        assert!(limiter.check_at("a", now + time::Duration::seconds(2)).allowed);
        assert!(limiter.entries.len() == 1);
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_millis(300));
        let now = datetime!(2024-01-01 12:00:00 UTC);
        let decision = limiter.check_at("a", now);
        assert_eq!(decision.retry_after_secs(now), 1);
    }
}
