use crate::config::BackoffSettings;
use parallax_error::{ParallaxError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Delay schedule applied before each attempt of a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrySchedule {
    /// Delay before attempt `n` is `delays[n - 1]`; the last delay repeats.
    Fixed(Vec<Duration>),
    /// Zero before the first attempt, then doubling from `base` up to `max`.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: Duration,
    },
}

impl RetrySchedule {
    pub fn from_settings(settings: &BackoffSettings) -> Self {
        match settings {
            BackoffSettings::Fixed { delays_ms } => {
                RetrySchedule::Fixed(delays_ms.iter().copied().map(Duration::from_millis).collect())
            }
            BackoffSettings::Exponential {
                base_ms,
                max_ms,
                jitter_ms,
            } => RetrySchedule::Exponential {
                base: Duration::from_millis(*base_ms),
                max: Duration::from_millis(*max_ms),
                jitter: Duration::from_millis(*jitter_ms),
            },
        }
    }

    /// Delay to wait before `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self {
            RetrySchedule::Fixed(delays) => {
                let idx = (attempt as usize - 1).min(delays.len().saturating_sub(1));
                delays.get(idx).copied().unwrap_or(Duration::ZERO)
            }
            RetrySchedule::Exponential { base, max, jitter } => {
                if attempt == 1 {
                    return Duration::ZERO;
                }
                next_retry_delay(
                    attempt - 2,
                    base.as_millis() as u64,
                    max.as_millis() as u64,
                    jitter.as_millis() as u64,
                )
            }
        }
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        RetrySchedule::from_settings(&BackoffSettings::default())
    }
}

/// Calculate the delay for the next retry attempt with exponential backoff.
pub fn next_retry_delay(exponent: u32, base_ms: u64, max_ms: u64, jitter_ms: u64) -> Duration {
    let multiplier = 2_u64.saturating_pow(exponent);
    let delay = base_ms.saturating_mul(multiplier);
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_ms)
    } else {
        0
    };
    let total = delay.saturating_add(jitter);
    Duration::from_millis(total.min(max_ms))
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub schedule: RetrySchedule,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, schedule: RetrySchedule) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule,
        }
    }
}

/// Execute an async operation, retrying only errors classified as transient.
pub async fn retry_async<T, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, ParallaxError>>,
{
    let mut attempt = 1;
    loop {
        let delay = policy.schedule.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if attempt >= policy.max_attempts {
                    error!(
                        "Failed to execute '{}' after {} attempts: {}",
                        operation_name, policy.max_attempts, e
                    );
                    return Err(e);
                }
                warn!(
                    "Operation '{}' failed. Retrying in {:?} (Attempt {}/{}): {}",
                    operation_name,
                    policy.schedule.delay_before(attempt + 1),
                    attempt,
                    policy.max_attempts,
                    e
                );
                attempt += 1;
            }
        }
    }
}
