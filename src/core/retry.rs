//! Retry policy for upstream calls
//!
//! Exponential backoff with additive random jitter. The policy only computes
//! delays and classifies statuses; the client owns the loop and the sleep.

use crate::core::config::Config;
use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;

/// Largest exponent applied to the base delay
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Bounded retry policy for one relay request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each later one
    pub base_delay: Duration,
    /// Upper bound of the random offset added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }

    /// Delay without jitter after the attempt with the given zero-based index
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(multiplier)
    }

    /// `base * 2^attempt + uniform(0..=max_jitter)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis().min(u64::MAX as u128) as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.base_backoff(attempt).saturating_add(jitter)
    }

    /// Whether another attempt may follow the one with the given index
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Rate limiting and server errors are transient; everything else is final.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_backoff_stays_within_jitter_window() {
        let policy = RetryPolicy::default();
        for attempt in 0..3 {
            let floor = Duration::from_millis(1000 * (1 << attempt));
            for _ in 0..32 {
                let delay = policy.backoff_delay(attempt);
                assert!(delay >= floor);
                assert!(delay <= floor + Duration::from_millis(500));
            }
        }
    }

    #[test]
    fn test_backoff_increases_between_attempts() {
        // Jitter is smaller than the base delay, so each window starts above
        // the previous one's maximum.
        let policy = RetryPolicy::default();
        for _ in 0..32 {
            let first = policy.backoff_delay(0);
            let second = policy.backoff_delay(1);
            let third = policy.backoff_delay(2);
            assert!(first < second);
            assert!(second < third);
        }
    }

    #[test]
    fn test_backoff_without_jitter_is_exact() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(10));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(80));
    }

    #[test]
    fn test_backoff_exponent_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_backoff(u32::MAX), policy.base_backoff(MAX_BACKOFF_EXPONENT));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.has_attempts_left(0));
        assert!(policy.has_attempts_left(1));
        assert!(!policy.has_attempts_left(2));
    }

    #[test]
    fn test_from_config_never_allows_zero_attempts() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }
}
