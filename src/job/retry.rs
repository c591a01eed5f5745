//! Retry policy for failed audits

use crate::config::JobConfig;
use crate::AuditError;
use std::time::Duration;

/// Exponential backoff between failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&JobConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_secs(config.backoff_base_secs),
        }
    }

    /// Delay before re-dispatching after the `attempt`-th failure
    ///
    /// `base`, `2 * base`, `4 * base`, ...
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }

    /// Returns true if another attempt should follow `failures` failed ones
    pub fn should_retry(&self, failures: u32, error: &AuditError) -> bool {
        error.is_retryable() && failures < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = policy();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(20));
    }

    #[test]
    fn test_should_retry_until_attempts_exhausted() {
        let policy = policy();
        let err = AuditError::Stage("discovery failed".into());
        assert!(policy.should_retry(1, &err));
        assert!(policy.should_retry(2, &err));
        assert!(!policy.should_retry(3, &err));
    }

    #[test]
    fn test_cancellation_never_retries() {
        assert!(!policy().should_retry(1, &AuditError::Cancelled));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_base, Duration::from_secs(5));
    }
}
