use std::{fmt::Display, future::Future, time::Duration};

use log::*;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that know whether trying again might succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// How often, and how patiently, a failing durable operation is retried.
///
/// Sleeps use `tokio::time`, so a paused tokio clock can drive the policy in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, backoff: DEFAULT_BACKOFF }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    /// A policy that tries exactly once.
    pub fn no_retries() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the attempts are used up. The last error is
    /// returned in the latter two cases.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => {
                    if attempt > 1 {
                        info!("🔁️ {label} succeeded on attempt {attempt}");
                    }
                    return Ok(v);
                },
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "🔁️ {label} failed on attempt {attempt}/{max_attempts}. {e}. Retrying in {}ms",
                        self.backoff.as_millis()
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                },
                Err(e) => {
                    if e.is_transient() {
                        error!("🔁️ {label} failed after {attempt} attempts. Giving up. {e}");
                    } else {
                        debug!("🔁️ {label} failed with a permanent error. {e}");
                    }
                    return Err(e);
                },
            }
        }
    }
}
