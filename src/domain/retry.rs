use std::time::Duration;

/// Limits applied to every webhook delivery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single wait.
    pub max_backoff: Duration,
    /// Failed attempts after which delivery is abandoned.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    pub fn start(&self) -> RetryState {
        RetryState {
            backoff: self.initial_backoff.min(self.max_backoff),
            retries: 0,
            max_backoff: self.max_backoff,
            max_retries: self.max_retries,
        }
    }
}

/// Per-payload retry counters. Owned by a single delivery loop, never shared.
#[derive(Debug, Clone)]
pub struct RetryState {
    backoff: Duration,
    retries: u32,
    max_backoff: Duration,
    max_retries: u32,
}

impl RetryState {
    /// Records a failed attempt.
    ///
    /// Returns the wait before the next attempt, or `None` once the retry
    /// budget is spent. The backoff doubles after each returned wait and
    /// never exceeds the policy's cap.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.retries += 1;
        if self.retries >= self.max_retries {
            return None;
        }

        let wait = self.backoff;
        self.backoff = self.backoff.saturating_mul(2).min(self.max_backoff);
        Some(wait)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}
