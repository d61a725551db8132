//! Resilient call wrapper for the perception service.
//!
//! Every outbound call runs under a per-attempt timeout and a bounded
//! exponential-backoff retry loop. Errors are classified as retryable
//! (timeouts, rate limits, 5xx, transport) or fatal (bad input, auth,
//! missing resources); fatal errors propagate immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Classified failure of an external call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by remote service")]
    RateLimited,

    #[error("remote service error: status {status}")]
    Server { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("bad request: {0}")]
    BadInput(String),

    #[error("authentication rejected")]
    Auth,

    #[error("remote resource not found: {0}")]
    NotFound(String),
}

impl CallError {
    /// Default classification: transient conditions retry, everything
    /// that would fail identically on the next attempt does not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited | Self::Server { .. } | Self::Network(_) => true,
            Self::BadInput(_) | Self::Auth | Self::NotFound(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Retry configuration
// ---------------------------------------------------------------------------

/// Tunable parameters for the retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt, so `max_retries = 3` allows four
    /// invocations in total.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay, jitter included.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Timeout applied to each attempt independently.
    pub attempt_timeout: Duration,
    /// Jitter fraction: each delay gains a uniform random amount up to
    /// this fraction of its base value. Zero disables jitter.
    pub jitter: f64,
    /// Optional override of [`CallError::is_retryable`].
    pub classify: Option<fn(&CallError) -> bool>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            attempt_timeout: Duration::from_secs(60),
            jitter: 0.3,
            classify: None,
        }
    }
}

impl RetryConfig {
    fn should_retry(&self, err: &CallError) -> bool {
        match self.classify {
            Some(f) => f(err),
            None => err.is_retryable(),
        }
    }
}

/// Backoff delay before the retry following failed attempt `attempt`
/// (zero-based).
///
/// The base delay is `initial_delay * multiplier^attempt`; jitter is
/// added on top and the result is clamped to `max_delay`.
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.initial_delay.as_millis() as f64 * config.multiplier.powi(attempt as i32);
    let base_ms = base_ms.min(config.max_delay.as_millis() as f64);

    let jitter_ms = if config.jitter > 0.0 {
        rand::rng().random_range(0.0..=config.jitter * base_ms)
    } else {
        0.0
    };

    Duration::from_millis((base_ms + jitter_ms) as u64).min(config.max_delay)
}

// ---------------------------------------------------------------------------
// Call wrapper
// ---------------------------------------------------------------------------

/// Run `op` under the retry policy in `config`.
///
/// `op` receives the zero-based attempt number and is re-invoked (never
/// cloned futures) for each retry. Returns the first success, the first
/// fatal error, or the last error once retries are exhausted.
pub async fn call<T, F, Fut>(config: &RetryConfig, op_name: &str, op: F) -> Result<T, CallError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    call_with_retry_hook(config, op_name, op, |_, _| {}).await
}

/// [`call`], with `on_retry` invoked once per failed-but-retryable
/// attempt before sleeping. The hook feeds the transient-error debouncer
/// so clients only see failures that persist.
pub async fn call_with_retry_hook<T, F, Fut, H>(
    config: &RetryConfig,
    op_name: &str,
    mut op: F,
    mut on_retry: H,
) -> Result<T, CallError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
    H: FnMut(u32, &CallError),
{
    let mut attempt = 0u32;

    loop {
        let result = match tokio::time::timeout(config.attempt_timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout(config.attempt_timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if config.should_retry(&err) && attempt < config.max_retries => {
                let delay = backoff_delay(attempt, config);
                tracing::warn!(
                    op = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying failed call",
                );
                on_retry(attempt, &err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
