//! Per-call backoff bookkeeping.

use crate::config::{MAX_BACKOFF_EXPONENT, RetryConfig};
use std::time::Duration;

/// Retry counter owned by a single top-level call.
///
/// Created fresh for every call and dropped when it completes, so concurrent
/// calls on the same executor never share attempt counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffState {
    attempts: u32,
    power: u64,
}

impl BackoffState {
    /// Start a new call sequence.
    pub fn new() -> Self {
        Self {
            attempts: 0,
            power: 1,
        }
    }

    /// Retries taken so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Register a failure and return how long to wait before the next
    /// attempt, or `None` once `config.max_retries` retries have been used.
    ///
    /// The ceiling is checked with `>=` so that lowering `max_retries` on a
    /// shared executor mid-sequence still terminates the sequence.
    pub fn next_delay(&mut self, config: &RetryConfig) -> Option<Duration> {
        if self.attempts >= config.max_retries {
            return None;
        }

        self.attempts += 1;
        if self.attempts <= MAX_BACKOFF_EXPONENT {
            self.power <<= 1;
        }

        Some(config.delay_for_power(self.power))
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_config_schedule() {
        let config = RetryConfig::default().with_max_retries(8);
        let mut state = BackoffState::new();

        let delays: Vec<Duration> = std::iter::from_fn(|| state.next_delay(&config)).collect();
        assert_eq!(delays, config.delay_schedule());
        assert_eq!(state.attempts(), 8);
    }

    #[test]
    fn test_zero_retries() {
        let mut state = BackoffState::new();
        assert_eq!(state.next_delay(&RetryConfig::no_retry()), None);
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn test_lowered_ceiling_stops_sequence() {
        let mut state = BackoffState::new();
        let generous = RetryConfig::immediate(10);
        assert!(state.next_delay(&generous).is_some());
        assert!(state.next_delay(&generous).is_some());

        assert_eq!(state.next_delay(&RetryConfig::immediate(1)), None);
    }

    #[test]
    fn test_power_stops_doubling() {
        let config = RetryConfig::new(100, Duration::from_nanos(2), Duration::MAX);
        let mut state = BackoffState::new();

        for _ in 0..MAX_BACKOFF_EXPONENT {
            state.next_delay(&config);
        }
        let at_cap = state.clone();
        let next = state.next_delay(&config);

        assert_eq!(state.power, at_cap.power);
        assert_eq!(next, Some(Duration::from_nanos((1 << 30) - 1)));
    }
}
