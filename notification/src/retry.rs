//! Exponential backoff for failed deliveries.

use std::time::Duration;

pub const DEFAULT_RETRY_CEILING: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Exponential backoff policy.
///
/// Attempt `n` (1-based) that fails transiently is retried after
/// `base_delay * 2^(n-1)`, capped at `max_delay`. No attempt beyond `ceiling`
/// is ever made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    ceiling: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy with default delays.
    ///
    /// # Arguments
    ///
    /// * `ceiling` - Maximum number of delivery attempts per job
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling: ceiling.max(1),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Whether a transient failure of `attempt` may be followed by another one.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.ceiling
    }

    /// Calculate exponential backoff delay after the given failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let delay = self.base_delay.as_secs_f64() * 2_f64.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Backoff for `attempt`, stretched to a provider hint when that is longer.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.backoff(attempt);
        match hint {
            Some(hint) if hint > backoff => hint.min(self.max_delay),
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(1).as_secs(), 1);
        assert_eq!(policy.backoff(2).as_secs(), 2);
        assert_eq!(policy.backoff(3).as_secs(), 4);
        assert_eq!(policy.backoff(4).as_secs(), 8);
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(20);

        assert_eq!(policy.backoff(10), DEFAULT_MAX_DELAY);
        assert_eq!(policy.backoff(u32::MAX), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn test_ceiling() {
        let policy = RetryPolicy::new(5);

        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert_eq!(RetryPolicy::new(0).ceiling(), 1);
    }

    #[test]
    fn test_hint_extends_but_never_exceeds_cap() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.delay_for(3, Some(Duration::from_millis(10))),
            Duration::from_secs(4)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(3600))),
            DEFAULT_MAX_DELAY
        );
    }
}
