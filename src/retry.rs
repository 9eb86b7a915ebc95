//! Retry logic with exponential backoff
//!
//! Bounded retry for operations that fail while a file is still held by the
//! producing application (antivirus scans, download managers finalizing).
//! Exponential backoff with optional jitter, capped by the configured
//! maximum delay.

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (file locked, sharing violation, interrupted I/O)
/// should return `true`. Permanent failures (not found, permission denied,
/// corrupt archive) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // A file still being written or scanned shows up as one of these
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::ResourceBusy
                    | std::io::ErrorKind::PermissionDenied
            ),
            // Corrupt containers never become valid by waiting
            Error::UnsupportedArchive { .. } => false,
            Error::Extraction { .. } => false,
            // Move/delete failures already consumed their own retry budget
            Error::MoveFailed { .. } => false,
            Error::DeleteFailed { .. } => false,
            // State and configuration problems are permanent
            Error::StateCorruption { .. } => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
            Error::Watch(_) => false,
            Error::ShuttingDown => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Retries only errors whose `is_retryable()` is true, up to
/// `config.max_attempts` retries after the initial try. Returns the
/// successful result or the last error.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::debug!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                let jittered_delay = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to spread out contention on a busy file
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lands between `delay` and `2 * delay`.
pub(crate) fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
