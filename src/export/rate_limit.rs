//! Rate-limit handling for API calls.
//!
//! Every remote call in the exporter goes through `RateLimitedCaller::call`,
//! which retries HTTP 429 responses according to a `RetryPolicy`. All waiting
//! (backoff and request pacing) goes through a `Sleeper` so tests can record
//! delays instead of blocking.

use std::time::Duration;

use tracing::{error, info};

use crate::config::RateLimitConfig;
use crate::error::{ApiError, ExportError};

/// Blocking wait, injectable for tests
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// How rate-limited calls are retried. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, counting the first
    pub max_attempts: u32,
    /// Wait used when the server gives no Retry-After
    pub default_wait: Duration,
    /// Added on top of every wait
    pub extra_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            default_wait: Duration::from_secs(config.default_wait_secs),
            extra_wait: Duration::from_secs(config.extra_wait_secs),
        }
    }

    /// Wait before retrying after a 429
    pub fn wait_for(&self, retry_after: Option<u64>) -> Duration {
        retry_after
            .map(Duration::from_secs)
            .unwrap_or(self.default_wait)
            + self.extra_wait
    }
}

/// Issues API calls, backing off and retrying on rate-limit responses
pub struct RateLimitedCaller<S> {
    policy: RetryPolicy,
    sleeper: S,
}

impl<S: Sleeper> RateLimitedCaller<S> {
    pub fn new(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `request`, retrying only `ApiError::RateLimited` until the policy's
    /// attempts are used up. Any other error is returned immediately.
    /// `label` names the call in logs and errors.
    pub fn call<T, F>(&self, label: &str, mut request: F) -> Result<T, ExportError>
    where
        F: FnMut() -> Result<T, ApiError>,
    {
        let mut attempt = 1;
        loop {
            match request() {
                Ok(value) => return Ok(value),
                Err(ApiError::RateLimited { retry_after }) if attempt < self.policy.max_attempts => {
                    let wait = self.policy.wait_for(retry_after);
                    let shown = retry_after.unwrap_or(self.policy.default_wait.as_secs());
                    info!(
                        call = label,
                        attempt,
                        "Rate limit hit. Retrying in {} second{}.",
                        shown,
                        if shown == 1 { "" } else { "s" }
                    );
                    self.sleeper.sleep(wait);
                    attempt += 1;
                }
                Err(source) => {
                    error!(call = label, attempt, error = %source, "API call failed");
                    return Err(ExportError::Api {
                        call: label.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Courtesy delay between requests; zero is a no-op
    pub fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.sleeper.sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::testing::RecordingSleeper;
    use std::cell::Cell;

    fn caller(sleeper: &RecordingSleeper) -> RateLimitedCaller<&RecordingSleeper> {
        RateLimitedCaller::new(RetryPolicy::default(), sleeper)
    }

    #[test]
    fn success_returns_without_sleeping() {
        let sleeper = RecordingSleeper::default();
        let result = caller(&sleeper).call("test", || Ok::<_, ApiError>(42));
        assert_eq!(result.unwrap(), 42);
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn rate_limit_sleeps_retry_after_plus_one_then_retries_once() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0);

        let result = caller(&sleeper).call("test", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(ApiError::RateLimited { retry_after: Some(7) })
            } else {
                Ok("page")
            }
        });

        assert_eq!(result.unwrap(), "page");
        assert_eq!(calls.get(), 2);
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(8)]);
    }

    #[test]
    fn missing_retry_after_uses_default_wait() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(None), Duration::from_secs(21));
        assert_eq!(policy.wait_for(Some(0)), Duration::from_secs(1));
    }

    #[test]
    fn second_rate_limit_is_fatal() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0);

        let result: Result<(), _> = caller(&sleeper).call("conversations.history C1", || {
            calls.set(calls.get() + 1);
            Err(ApiError::RateLimited { retry_after: Some(1) })
        });

        assert_eq!(calls.get(), 2);
        match result.unwrap_err() {
            ExportError::Api { call, source } => {
                assert_eq!(call, "conversations.history C1");
                assert!(source.is_rate_limited());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_http_errors_are_not_retried() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0);

        let result: Result<(), _> = caller(&sleeper).call("test", || {
            calls.set(calls.get() + 1);
            Err(ApiError::Status {
                method: "conversations.history".to_string(),
                status: 500,
            })
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn pause_skips_zero_durations() {
        let sleeper = RecordingSleeper::default();
        let caller = caller(&sleeper);
        caller.pause(Duration::ZERO);
        caller.pause(Duration::from_millis(1300));
        assert_eq!(sleeper.slept(), vec![Duration::from_millis(1300)]);
    }
}
