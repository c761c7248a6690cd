use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one); 0 is treated as 1
    pub max_attempts: u32,
    /// Initial delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles the delay each time)
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Preset: provider queries made at startup (4 attempts)
    /// Delays: 1s, 2s, 4s = 7s total wait time
    pub fn startup() -> Self {
        Self::new(4, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(4))
            .with_backoff_multiplier(2.0)
    }

    /// Preset: initial database connection (5 attempts)
    /// Delays: 500ms, 1s, 2s, 4s = 7.5s total wait time
    pub fn database_connect() -> Self {
        Self::new(5, Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(4))
            .with_backoff_multiplier(2.0)
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::startup()
    }
}

/// Execute an async operation with retries
///
/// Returns the result of the operation, or the last error if all attempts failed.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(config, operation_name, operation, |_| true).await
}

/// Execute an async operation with retries, using a predicate to determine if retry is appropriate
///
/// Some errors (like 4xx client errors) should not be retried, while others (5xx, network) should.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        // Wait before retry (except for first attempt)
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                "{}: Retry attempt {}/{} after {:?}",
                operation_name,
                attempt + 1,
                max_attempts,
                delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}/{}",
                        operation_name,
                        attempt + 1,
                        max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(
                        "{}: Error is not retryable, failing immediately: {}",
                        operation_name, e
                    );
                    return Err(e);
                }

                attempt += 1;
                let remaining = max_attempts - attempt;
                if remaining == 0 {
                    warn!(
                        "{}: All {} attempts failed. Last error: {}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }

                warn!(
                    "{}: Attempt {}/{} failed ({}), {} retries remaining",
                    operation_name, attempt, max_attempts, e, remaining
                );
            }
        }
    }
}
