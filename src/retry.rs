//! Bounded retry with exponential backoff for task submission
//!
//! Only a rejected submission (non-2xx) is retried. Transport faults and
//! malformed responses surface immediately. Waits follow a deterministic
//! schedule: `initial_delay`, then multiplied by `backoff_multiplier` after
//! every failure (10 s, 15 s, 22.5 s, ... with the defaults), optionally capped
//! by `max_delay`.
//!
//! # Example
//!
//! ```no_run
//! use anaplan_tasks::retry::submit_with_retry;
//! use anaplan_tasks::config::SubmitRetryConfig;
//! use anaplan_tasks::error::Error;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = SubmitRetryConfig::default();
//! let task_id = submit_with_retry(&config, 2, || async {
//!     Ok::<_, Error>("task-1".to_string())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::SubmitRetryConfig;
use crate::error::Error;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        // Everything else is either a caller error, a fault the caller must
        // see, or a response that will not improve on resubmission.
        matches!(self, Error::SubmitRejected { .. })
    }
}

/// Iterator over the waits between attempts
#[derive(Clone, Debug)]
pub struct BackoffSchedule {
    next: Duration,
    multiplier: f64,
    max_delay: Option<Duration>,
}

impl BackoffSchedule {
    /// Schedule described by `config`
    pub fn new(config: &SubmitRetryConfig) -> Self {
        Self {
            next: config.initial_delay,
            multiplier: config.backoff_multiplier,
            max_delay: config.max_delay,
        }
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = match self.max_delay {
            Some(max) => self.next.min(max),
            None => self.next,
        };
        let scaled = self.next.as_secs_f64() * self.multiplier;
        self.next = Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX);
        Some(current)
    }
}

/// Run `operation` up to `retry_budget + 1` times
///
/// Sleeps between failed attempts but not after the last one. When the budget
/// is spent the last retryable error is wrapped in [`Error::RequestExhausted`].
pub async fn submit_with_retry<F, Fut, T>(
    config: &SubmitRetryConfig,
    retry_budget: u32,
    mut operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut schedule = BackoffSchedule::new(config);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "submission succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt <= retry_budget => {
                let delay = schedule.next().unwrap_or(config.initial_delay);
                tracing::warn!(
                    error = %e,
                    attempt,
                    retry_budget,
                    delay_ms = delay.as_millis() as u64,
                    "submission failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    error = %e,
                    attempts = attempt,
                    "submission failed after all retry attempts exhausted"
                );
                return Err(Error::RequestExhausted {
                    attempts: attempt,
                    last_error: e.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "submission failed with non-retryable error");
                return Err(e);
            }
        }
    }
}
