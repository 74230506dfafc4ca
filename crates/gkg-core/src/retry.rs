//! Bounded retry with exponential backoff for transient oracle failures

use gkg_oracle::OracleError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry policy for `OracleError::Unavailable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, first call included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Create default policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry without sleeping
    #[inline]
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based)
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// Run `call`, retrying transient failures
    ///
    /// Non-transient errors return immediately. The final transient error is
    /// returned with the attempt count appended.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Err(OracleError::Unavailable(msg)) if attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{label}: oracle unavailable ({msg}), retry {attempt}/{} in {}ms",
                        attempts - 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(OracleError::Unavailable(msg)) => {
                    return Err(OracleError::Unavailable(format!(
                        "{msg} (after {attempt} attempts)"
                    )));
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}
