//! # Eventually: Deadline-Bounded Polling
//!
//! General-purpose poller for eventually-consistent condition checks.
//! It is independent of the remote provider's attempt-count retry: this
//! one stops on a wall-clock deadline, that one on an attempt budget.
//!
//! The only suspension point is the wait between attempts, which parks the
//! calling task only.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::RegistryError;

/// Options for [`eventually`].
#[derive(Debug, Clone)]
pub struct EventuallyOptions {
    /// Overall deadline (default 3000ms).
    pub timeout: Duration,
    /// Wait between attempts (default 100ms).
    pub interval: Duration,
    /// Double the wait after each failure, capped at `max_interval`.
    pub exponential_backoff: bool,
    /// Backoff cap (default 1000ms).
    pub max_interval: Duration,
    /// Label used in the timeout message.
    pub description: String,
}

impl Default for EventuallyOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            interval: Duration::from_millis(100),
            exponential_backoff: false,
            max_interval: Duration::from_millis(1000),
            description: "operation".to_string(),
        }
    }
}

impl EventuallyOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, max_interval: Duration) -> Self {
        self.exponential_backoff = true;
        self.max_interval = max_interval;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Invoke `operation` until it succeeds or the deadline would be crossed.
///
/// After a failure, if the elapsed time plus the next wait meets or exceeds
/// `timeout`, fails immediately with [`RegistryError::Timeout`] naming the
/// attempt count and the last failure.
pub async fn eventually<T, E, F, Fut>(
    mut operation: F,
    options: EventuallyOptions,
) -> Result<T, RegistryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut interval = options.interval;
    let mut attempts: u32 = 0;

    while start.elapsed() < options.timeout {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if start.elapsed() + interval >= options.timeout {
                    return Err(RegistryError::Timeout(format!(
                        "{} timed out after {}ms ({} attempts): {}",
                        options.description,
                        options.timeout.as_millis(),
                        attempts,
                        err
                    )));
                }
                tracing::debug!(
                    attempt = attempts,
                    description = %options.description,
                    "condition not met, retrying in {interval:?}: {err}"
                );
                tokio::time::sleep(interval).await;
                if options.exponential_backoff {
                    interval = (interval * 2).min(options.max_interval);
                }
            }
        }
    }

    Err(RegistryError::Timeout(format!(
        "{} timed out after {}ms ({} attempts)",
        options.description,
        options.timeout.as_millis(),
        attempts
    )))
}

/// Bound a future by a deadline. On expiry the future is dropped, which
/// cancels any in-flight I/O it owns.
pub async fn with_timeout<T, Fut>(
    fut: Fut,
    deadline: Duration,
    message: impl Into<String>,
) -> Result<T, RegistryError>
where
    Fut: Future<Output = Result<T, RegistryError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(RegistryError::Timeout(message.into())),
    }
}
