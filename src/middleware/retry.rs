use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{RetryStrategy, TranslationConfig};

/// Upper bound on a single backoff wait
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Decides whether a failed call is retried and how long to wait first.
///
/// Backend errors carry no retryable/permanent classification, so the
/// policy only sees how many attempts have already been made.
pub trait RetryPolicy: Send + Sync {
    /// `attempts_made` counts attempts so far (>= 1). `None` means give up.
    fn next_delay(&self, attempts_made: u32) -> Option<Duration>;

    /// Total attempts this policy allows
    fn max_attempts(&self) -> u32;
}

/// Same wait between every attempt
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, attempts_made: u32) -> Option<Duration> {
        (attempts_made < self.max_attempts).then_some(self.delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Base delay doubled after every failed attempt, capped
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempts_made: u32) -> Option<Duration> {
        if attempts_made >= self.max_attempts {
            return None;
        }
        let factor = 2_u32.saturating_pow(attempts_made.saturating_sub(1));
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Build the policy selected by configuration
pub fn policy_from_config(config: &TranslationConfig) -> Arc<dyn RetryPolicy> {
    match config.retry_strategy {
        RetryStrategy::Fixed => Arc::new(FixedDelay::new(config.max_retries, config.retry_delay)),
        RetryStrategy::Exponential => Arc::new(ExponentialBackoff::new(
            config.max_retries,
            config.retry_delay,
            MAX_BACKOFF,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_allows_exactly_max_attempts() {
        let policy = FixedDelay::new(3, Duration::from_secs(1));

        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(3), None);
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = FixedDelay::new(1, Duration::from_secs(1));
        assert_eq!(policy.next_delay(1), None);
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let policy = ExponentialBackoff::new(6, Duration::from_millis(500), Duration::from_secs(3));

        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_secs(3)));
        assert_eq!(policy.next_delay(5), Some(Duration::from_secs(3)));
        assert_eq!(policy.next_delay(6), None);
    }

    fn translation_config(pairs: &[(&str, &str)]) -> TranslationConfig {
        let map: std::collections::HashMap<&str, &str> = pairs.iter().copied().collect();
        crate::core::Config::from_lookup(|key: &str| map.get(key).map(|v| v.to_string()))
            .unwrap()
            .translation
    }

    #[test]
    fn test_policy_from_config_selects_strategy() {
        let fixed = policy_from_config(&translation_config(&[
            ("MAX_RETRIES", "4"),
            ("RETRY_DELAY_SECONDS", "0.5"),
        ]));
        assert_eq!(fixed.max_attempts(), 4);
        assert_eq!(fixed.next_delay(1), Some(Duration::from_millis(500)));
        assert_eq!(fixed.next_delay(3), Some(Duration::from_millis(500)));
        assert_eq!(fixed.next_delay(4), None);

        let exponential = policy_from_config(&translation_config(&[
            ("MAX_RETRIES", "4"),
            ("RETRY_DELAY_SECONDS", "0.5"),
            ("RETRY_STRATEGY", "exponential"),
        ]));
        assert_eq!(exponential.max_attempts(), 4);
        assert_eq!(exponential.next_delay(1), Some(Duration::from_millis(500)));
        assert_eq!(exponential.next_delay(3), Some(Duration::from_secs(2)));
        assert_eq!(exponential.next_delay(4), None);
    }
}
