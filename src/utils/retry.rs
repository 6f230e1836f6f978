use crate::utils::error::{MenuError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fixed-delay retry with a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds, returns an error `should_retry` rejects, or the
    /// attempts run out. `op` receives the 1-based attempt number.
    ///
    /// Cancellation is checked before every attempt and interrupts the delay.
    pub async fn run<T, F, Fut, P>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        should_retry: P,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&MenuError) -> bool,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(MenuError::Cancelled);
            }

            if attempt > 1 {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = self.max_attempts,
                    "🔁 Retrying after {:?}",
                    self.delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(MenuError::Cancelled),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(operation, attempt, error = %e, "Attempt failed");
                    if !should_retry(&e) {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        let source = last_error.unwrap_or(MenuError::Cancelled);
        tracing::error!(operation, attempts = self.max_attempts, error = %source, "❌ All attempts failed");
        Err(MenuError::RetriesExhausted {
            operation: operation.to_string(),
            attempts: self.max_attempts,
            source: Box::new(source),
        })
    }
}
