//! Reconnect delay bookkeeping for the stream service.
//!
//! Twitter asks streaming clients to back off when reconnecting. We use an
//! exponential backoff starting at one second and doubling on every failed
//! reconnect, up to ten minutes. Explicit rate limiting (HTTP 420) starts at
//! thirty seconds instead.

use std::time::Duration;

/// Delay used after the first ordinary failure, in seconds.
pub const RECONNECT_DELAY_INITIAL: u64 = 1;

/// Delay floor after a rate-limit (HTTP 420) response, in seconds.
pub const RECONNECT_DELAY_RATE_LIMIT: u64 = 30;

/// Factor applied on each consecutive failure.
pub const RECONNECT_DELAY_MULTIPLIER: u64 = 2;

/// Hard ceiling on the delay, in seconds.
pub const RECONNECT_DELAY_MAX: u64 = 60 * 10;

/// Current reconnect delay of a stream service.
///
/// Starts at zero. A successful connection parks it at the initial floor so
/// the next failure reconnects after one second rather than doubling stale
/// state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectDelay {
    secs: u64,
    after_success: bool,
}

impl ReconnectDelay {
    /// A delay of zero, as for a service that has never failed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            secs: 0,
            after_success: false,
        }
    }

    /// A delay that already holds `secs` (not clamped until the next update).
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            secs,
            after_success: false,
        }
    }

    /// Current delay.
    #[must_use]
    pub const fn current(&self) -> Duration {
        Duration::from_secs(self.secs)
    }

    /// Current delay in whole seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.secs
    }

    /// Back to zero (service stopped).
    pub const fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record a successful connection.
    pub const fn connected(&mut self) {
        self.secs = RECONNECT_DELAY_INITIAL;
        self.after_success = true;
    }

    /// Advance after an ordinary disconnection and return the new delay.
    pub fn escalate(&mut self) -> Duration {
        if self.after_success || self.secs < RECONNECT_DELAY_INITIAL {
            self.secs = RECONNECT_DELAY_INITIAL;
        } else {
            self.secs = self.secs.saturating_mul(RECONNECT_DELAY_MULTIPLIER);
        }
        self.settle()
    }

    /// Advance after a rate-limit response and return the new delay.
    pub fn rate_limited(&mut self) -> Duration {
        if self.secs < RECONNECT_DELAY_RATE_LIMIT {
            self.secs = RECONNECT_DELAY_RATE_LIMIT;
        } else {
            self.secs = self.secs.saturating_mul(RECONNECT_DELAY_MULTIPLIER);
        }
        self.settle()
    }

    fn settle(&mut self) -> Duration {
        self.after_success = false;
        self.secs = self.secs.min(RECONNECT_DELAY_MAX);
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinary_failures_double_to_ceiling() {
        let mut delay = ReconnectDelay::new();
        let observed: Vec<u64> = (0..12).map(|_| delay.escalate().as_secs()).collect();
        assert_eq!(
            observed,
            vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 600, 600]
        );
    }

    #[test]
    fn test_never_exceeds_ceiling() {
        let mut delay = ReconnectDelay::new();
        for _ in 0..200 {
            assert!(delay.escalate() <= Duration::from_secs(RECONNECT_DELAY_MAX));
        }
        assert_eq!(delay.as_secs(), RECONNECT_DELAY_MAX);
    }

    #[test]
    fn test_oversized_delay_clamped() {
        let mut delay = ReconnectDelay::from_secs(60 * 60 * 24);
        assert_eq!(delay.escalate(), Duration::from_secs(600));
    }

    #[test]
    fn test_rate_limit_floor() {
        for start in [0, 1, 2, 16, 29] {
            let mut delay = ReconnectDelay::from_secs(start);
            assert_eq!(delay.rate_limited(), Duration::from_secs(30), "from {start}");
        }
    }

    #[test]
    fn test_rate_limit_doubles_above_floor() {
        let mut delay = ReconnectDelay::from_secs(30);
        assert_eq!(delay.rate_limited(), Duration::from_secs(60));
        assert_eq!(delay.rate_limited(), Duration::from_secs(120));

        let mut delay = ReconnectDelay::from_secs(400);
        assert_eq!(delay.rate_limited(), Duration::from_secs(600));
    }

    #[test]
    fn test_success_resets_next_failure_to_floor() {
        let mut delay = ReconnectDelay::new();
        assert_eq!(delay.escalate(), Duration::from_secs(1));

        delay.connected();
        assert_eq!(delay.current(), Duration::from_secs(1));
        assert_eq!(delay.escalate(), Duration::from_secs(1));
        assert_eq!(delay.escalate(), Duration::from_secs(2));
    }

    #[test]
    fn test_success_after_long_backoff() {
        let mut delay = ReconnectDelay::from_secs(512);
        delay.connected();
        assert_eq!(delay.escalate(), Duration::from_secs(1));
    }

    #[test]
    fn test_reset() {
        let mut delay = ReconnectDelay::from_secs(64);
        delay.reset();
        assert_eq!(delay, ReconnectDelay::new());
        assert_eq!(delay.current(), Duration::ZERO);
    }
}
