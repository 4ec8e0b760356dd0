//! Bounded exponential-backoff retry for outbound calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Errors that know whether repeating the call may succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for market_data_api::Error {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Retry limits. `max_retries` counts attempts after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryConfig {
    /// Defaults overridden by `DASHFOLIO_RETRY_MAX`, `DASHFOLIO_RETRY_BASE_MS`
    /// and `DASHFOLIO_RETRY_MAX_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_usize("DASHFOLIO_RETRY_MAX", defaults.max_retries),
            base_delay_ms: env_u64("DASHFOLIO_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_u64("DASHFOLIO_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(30) as u32;
        let exp = 1u64 << shift;
        let base = self
            .base_delay_ms
            .saturating_mul(exp)
            .min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

/// Runs `f` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
pub async fn with_retry<T, E, F, Fut>(cfg: &RetryConfig, label: &str, mut f: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0usize;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt > cfg.max_retries || !err.is_retryable() {
                    return Err(err);
                }
                let delay = cfg.delay_for_attempt(attempt);
                tracing::warn!(
                    "{} request failed (attempt {}/{}): {}, retrying in {:.1}s",
                    label,
                    attempt,
                    cfg.max_retries,
                    err,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(transient={})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let cfg = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 3000,
        };
        let first = cfg.delay_for_attempt(1).as_millis();
        assert!((800..=1200).contains(&first));
        let second = cfg.delay_for_attempt(2).as_millis();
        assert!((1600..=2400).contains(&second));
        let capped = cfg.delay_for_attempt(10).as_millis();
        assert!(capped <= 3600);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retried_until_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<u32, Flaky> = with_retry(&RetryConfig::default(), "chart", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Flaky(true))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let cfg = RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        };
        let result: Result<u32, Flaky> = with_retry(&cfg, "chart", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Flaky(true))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<u32, Flaky> = with_retry(&RetryConfig::default(), "chart", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Flaky(false))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
