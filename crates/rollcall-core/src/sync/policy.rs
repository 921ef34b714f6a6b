use std::time::Duration;

/// How failed submissions are retried.
///
/// The default retries forever, on every flush, with no delay: unsynced
/// attendance is never given up on. Setting `max_attempts` parks a record in
/// the needs-attention state once it has failed that many times; a non-zero
/// `backoff_base` holds a failed record back for `base * 2^(attempts - 1)`,
/// capped at `backoff_max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Delay before the next attempt after `attempts` failures, if any
    pub fn backoff(&self, attempts: u32) -> Option<Duration> {
        if self.backoff_base.is_zero() || attempts == 0 {
            return None;
        }
        let factor = 2u32.checked_pow(attempts - 1).unwrap_or(u32::MAX);
        Some(self.backoff_base.saturating_mul(factor).min(self.backoff_max))
    }
}
