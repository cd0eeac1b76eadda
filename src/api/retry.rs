// file: src/api/retry.rs
// description: exponential backoff for retryable metadata service failures
// reference: https://docs.rs/tokio/latest/tokio/time/fn.sleep.html

use crate::config::ApiConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::CancellationFlag;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_BACKOFF_EXPONENT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.retry_count, config.retry_delay())
    }

    /// Delay before retry number `attempt` (1-based): base, 2x, 4x ... capped at 32x.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub async fn run<T, F, Fut>(&self, cancel: &CancellationFlag, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            cancel.check()?;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempt,
                        self.max_retries + 1,
                        delay,
                        err
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
