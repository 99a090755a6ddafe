//! Retry policy with exponential backoff for Vault requests.

use crate::error::VaultError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry policy for executing Vault requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a retry policy.
    #[must_use]
    pub const fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }

    /// Cap on a single backoff delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disable jitter, making delays deterministic.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let base = self.initial_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter {
            // up to 25% on top of the base delay
            base.mul_f64(1.0 + rand::random::<f64>() * 0.25)
        } else {
            base
        }
    }

    /// Whether a failure on `attempt` should be retried.
    #[must_use]
    pub const fn should_retry(&self, error: &VaultError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Run `operation`, retrying retryable failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted or on a
    /// non-retryable failure.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, VaultError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VaultError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if self.should_retry(&error, attempt) => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(attempt, ?delay, %error, "Retrying Vault request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(100))
    }
}
