//! Per-recipient command rate limiting.

use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use hygrobot_types::RecipientId;

/// Minimum spacing between rate-limited commands from one recipient.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::seconds(3);

/// Tracks each recipient's last accepted command.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_seen: Mutex<HashMap<RecipientId, OffsetDateTime>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or throttle a command at `now`.
    ///
    /// Admission records `now` as the recipient's last command. Throttling
    /// returns the whole seconds left to wait, rounded up past zero so the
    /// reply never says "wait 0 seconds".
    pub async fn check(&self, recipient: RecipientId, now: OffsetDateTime) -> Result<(), u64> {
        let mut last_seen = self.last_seen.lock().await;
        if let Some(last) = last_seen.get(&recipient) {
            let elapsed = now - *last;
            if elapsed < self.min_interval {
                let remaining = (self.min_interval - elapsed).whole_seconds() as u64 + 1;
                return Err(remaining);
            }
        }
        last_seen.insert(recipient, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i64) -> RecipientId {
        RecipientId::new(raw).unwrap()
    }

    fn at(unix: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(unix).unwrap()
    }

    #[tokio::test]
    async fn first_command_is_admitted() {
        let limiter = RateLimiter::default();
        assert!(limiter.check(id(1), at(1000)).await.is_ok());
    }

    #[tokio::test]
    async fn rapid_repeat_is_throttled_with_remaining_seconds() {
        let limiter = RateLimiter::default();
        assert!(limiter.check(id(1), at(1000)).await.is_ok());
        assert_eq!(limiter.check(id(1), at(1001)).await, Err(3));
        // The throttled attempt does not reset the window.
        assert!(limiter.check(id(1), at(1003)).await.is_ok());
    }

    #[tokio::test]
    async fn recipients_are_independent() {
        let limiter = RateLimiter::default();
        assert!(limiter.check(id(1), at(1000)).await.is_ok());
        assert!(limiter.check(id(2), at(1000)).await.is_ok());
        assert!(limiter.check(id(1), at(1001)).await.is_err());
        assert!(limiter.check(id(2), at(1004)).await.is_ok());
    }
}
