//! Bounded retry for rate-limited exchange pulls.

use std::time::Duration;

use tracing::debug;

use crate::ports::exchange_port::Fetched;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// `base_delay * 2^(attempt - 1)`
    Exponential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy.
    pub fn immediate(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// Repeats `fetch` while it reports rate limiting, up to the retry budget.
    ///
    /// A `RateLimited` result is only returned once the budget is spent.
    pub fn pull<T>(&self, mut fetch: impl FnMut() -> Fetched<T>) -> Fetched<T> {
        let mut attempt = 0;
        loop {
            match fetch() {
                Fetched::RateLimited if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    debug!(attempt, ?delay, "rate limited, backing off");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                other => return other,
            }
        }
    }
}
