//! Bounded exponential backoff.
//!
//! Retrying is an explicit state machine: every failed attempt is recorded
//! with [`Backoff::on_failure`], which either hands back the delay before the
//! next attempt or reports exhaustion. A chunk is therefore attempted at most
//! `max_retries + 1` times and the total sleep is bounded by
//! `max_retries * max_delay`.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            failures: 0,
        }
    }

    /// Delay after the `retry`-th failure (zero-based), doubling and capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(20);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    /// Attempts made so far (equals the number of recorded failures).
    pub fn attempts(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt. Returns the delay before retrying, or `None`
    /// once the retry budget is spent.
    pub fn on_failure(&mut self) -> Option<Duration> {
        let retry = self.failures;
        self.failures = self.failures.saturating_add(1);
        if retry >= self.policy.max_retries {
            None
        } else {
            Some(self.policy.delay_for(retry))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        }
    }

    #[test]
    fn delays_double_until_capped() {
        let mut backoff = policy(4).backoff();
        let delays: Vec<_> = std::iter::from_fn(|| backoff.on_failure()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(350),
                Duration::from_millis(350),
            ]
        );
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn zero_retries_exhausts_on_first_failure() {
        let mut backoff = policy(0).backoff();
        assert_eq!(backoff.on_failure(), None);
        assert_eq!(backoff.attempts(), 1);
        assert_eq!(policy(0).max_attempts(), 1);
    }

    #[test]
    fn large_retry_index_does_not_overflow() {
        let p = policy(u32::MAX);
        assert_eq!(p.delay_for(63), Duration::from_millis(350));
    }
}
