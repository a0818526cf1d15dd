//! Retry configuration.

use azservice_config::{ConfigValidator, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest exponent the backoff power is doubled to. Further retries keep
/// the power at `2^30`.
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Retry configuration.
///
/// The delay before retry `n` (1-based) is
/// `min(base_delay * (2^n - 1) / 2, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Number of retries after the first attempt. Zero means a single attempt.
    pub max_retries: u32,
    /// Base delay the exponential factor is applied to.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Create a retry config.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Create a retry config that retries without waiting.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Create a retry config that never retries.
    pub fn no_retry() -> Self {
        Self::immediate(0)
    }

    /// Set the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay slept before retry `attempt` (1-based). Attempt 0 is the first
    /// call and is never delayed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let power = 1u64 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.delay_for_power(power)
    }

    pub(crate) fn delay_for_power(&self, power: u64) -> Duration {
        let factor = u32::try_from(power.saturating_sub(1)).unwrap_or(u32::MAX);
        (self.base_delay.saturating_mul(factor) / 2).min(self.max_delay)
    }

    /// Every delay a call that exhausts its retries would sleep, in order.
    pub fn delay_schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries)
            .map(|attempt| self.delay_for_attempt(attempt))
            .collect()
    }
}

/// Retry policy settings as bound from the `RetryPolicy` configuration
/// section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RetryPolicySettings {
    pub max_retries: u32,
    pub delay_milliseconds: u64,
    pub max_delay_milliseconds: u64,
}

impl RetryPolicySettings {
    /// Configuration section the settings are bound from.
    pub const CONFIGURATION_KEY: &'static str = "RetryPolicy";
}

impl Default for RetryPolicySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay_milliseconds: 100,
            max_delay_milliseconds: 1000,
        }
    }
}

impl Validate for RetryPolicySettings {
    fn validate(&self) -> azservice_config::Result<()> {
        ConfigValidator::ordered(
            self.delay_milliseconds,
            self.max_delay_milliseconds,
            "Retry policy: DelayMilliseconds",
            "MaxDelayMilliseconds",
        )
    }
}

impl From<&RetryPolicySettings> for RetryConfig {
    fn from(settings: &RetryPolicySettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.delay_milliseconds),
            Duration::from_millis(settings.max_delay_milliseconds),
        )
    }
}

impl From<RetryPolicySettings> for RetryConfig {
    fn from(settings: RetryPolicySettings) -> Self {
        Self::from(&settings)
    }
}
