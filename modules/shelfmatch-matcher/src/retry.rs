use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

/// Bounded retry with fixed backoff for the remote-call portion of a row.
///
/// Kept separate from the row's business logic so it can be exercised with
/// an injected flaky call. The backoff is a flat delay (matching observed
/// provider throttling behavior); attempts are counted, not timed.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run `op` until it succeeds or `max_attempts` is exhausted; the last
    /// error is returned to the caller.
    pub async fn run<T, Fut, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "Attempt failed, retrying");
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "All attempts exhausted");
                    return Err(e);
                }
            }
        }
    }
}
