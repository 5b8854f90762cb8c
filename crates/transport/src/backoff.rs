//! Reconnect backoff for transports whose connection can fail.

use contracts::Milliseconds;

pub const MIN_BACKOFF: Milliseconds = 1_000;
pub const MAX_BACKOFF: Milliseconds = 16_000;

/// Exponential reconnect delay: doubles after each failure up to a ceiling and
/// resets once a connection succeeds.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    min_delay: Milliseconds,
    max_delay: Milliseconds,
    delay: Milliseconds,
    retry_at: Option<Milliseconds>,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(MIN_BACKOFF, MAX_BACKOFF)
    }
}

impl ReconnectBackoff {
    pub fn new(min_delay: Milliseconds, max_delay: Milliseconds) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            delay: min_delay,
            retry_at: None,
        }
    }

    /// Whether a connection attempt may be made at `now`.
    pub fn ready(&self, now: Milliseconds) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }

    /// Record a failed attempt at `now`.
    pub fn failed(&mut self, now: Milliseconds) {
        self.retry_at = Some(now + self.delay);
        self.delay = (self.delay * 2).min(self.max_delay);
    }

    pub fn succeeded(&mut self) {
        self.delay = self.min_delay;
        self.retry_at = None;
    }

    /// Delay that the next failure will impose.
    pub fn current_delay(&self) -> Milliseconds {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_to_ceiling() {
        let mut backoff = ReconnectBackoff::default();
        let mut delays = Vec::new();
        for _ in 0..7 {
            delays.push(backoff.current_delay());
            backoff.failed(0);
        }
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 16_000, 16_000]);
    }

    #[test]
    fn test_ready_after_delay() {
        let mut backoff = ReconnectBackoff::default();
        assert!(backoff.ready(0));
        backoff.failed(500);
        assert!(!backoff.ready(1_499));
        assert!(backoff.ready(1_500));
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = ReconnectBackoff::default();
        backoff.failed(0);
        backoff.failed(1_000);
        backoff.succeeded();
        assert_eq!(backoff.current_delay(), MIN_BACKOFF);
        assert!(backoff.ready(0));
    }
}
