//! Bounded exponential backoff for transient LLM failures.

use std::time::Duration;

use tracing::warn;

use crate::errors::LlmError;

/// Retry policy with exponential backoff. Deliberately jitterless so retry
/// schedules stay deterministic under test.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `n` (0-based).
    pub fn delay_for(&self, n: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(n)
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    ///
    /// Auth and decode failures escalate immediately; only errors for which
    /// [`LlmError::is_transient`] holds are retried.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut last: Option<LlmError> = None;
        for attempt in 0..self.attempts.max(1) {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient llm failure, backing off"
                    );
                    last = Some(e);
                    if attempt + 1 < self.attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(LlmError::RetriesExhausted {
            attempts: self.attempts,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
