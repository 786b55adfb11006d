//! Retry policy shared by the pagination driver and the record materializer
//!
//! A policy is plain data: how many retries follow the first attempt, how
//! long to wait between attempts, and the longest pause a rate-limit signal
//! may impose. Sleeping goes through `tokio::time`, so tests can run against
//! a paused clock.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,

    /// Delay doubles after every attempt
    Exponential,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the policy's delay
    Retry,

    /// Retry after the delay requested by the remote side
    RetryAfter(Duration),

    /// Give up immediately
    Abort,
}

/// Final error of a retried operation
#[derive(Debug)]
pub struct RetryError<E> {
    /// Error returned by the last attempt
    pub error: E,

    /// Number of attempts made
    pub attempts: u32,

    /// True when the retry budget ran out, false when the error was not retryable
    pub exhausted: bool,
}

/// Bounded retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,

    /// Delay before the first retry
    pub delay: Duration,

    pub backoff: Backoff,

    /// Cap on any single pause, including server-requested ones
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(2, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Policy with a constant delay between attempts
    pub fn fixed(retries: u32, delay: Duration) -> Self {
        Self {
            retries,
            delay,
            backoff: Backoff::Fixed,
            max_wait: crate::DEFAULT_MAX_RATE_LIMIT_WAIT,
        }
    }

    /// Policy whose delay doubles after each attempt
    pub fn exponential(retries: u32, delay: Duration) -> Self {
        Self {
            backoff: Backoff::Exponential,
            ..Self::fixed(retries, delay)
        }
    }

    /// Policy that retries without waiting
    pub fn immediate(retries: u32) -> Self {
        Self::fixed(retries, Duration::ZERO)
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Page retry policy from configuration
    pub fn for_pages(config: &RetryConfig) -> Self {
        Self::exponential(config.page_retries, Duration::from_millis(config.page_delay_ms))
            .with_max_wait(Duration::from_secs(config.max_rate_limit_wait_secs))
    }

    /// Media retry policy from configuration
    pub fn for_media(config: &RetryConfig) -> Self {
        Self::exponential(config.media_retries, Duration::from_millis(config.media_delay_ms))
            .with_max_wait(Duration::from_secs(config.max_rate_limit_wait_secs))
    }

    /// Total number of attempts, first one included
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_wait)
    }

    /// Runs `op` until it succeeds, `classify` says to stop, or the budget runs out
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, Fut, Op, Classify>(
        &self,
        label: &str,
        mut op: Op,
        classify: Classify,
    ) -> Result<T, RetryError<E>>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classify: Fn(&E) -> RetryDecision,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let decision = classify(&error);
            if decision == RetryDecision::Abort {
                return Err(RetryError {
                    error,
                    attempts: attempt,
                    exhausted: false,
                });
            }

            if attempt >= self.max_attempts() {
                return Err(RetryError {
                    error,
                    attempts: attempt,
                    exhausted: true,
                });
            }

            let delay = match decision {
                RetryDecision::RetryAfter(requested) => requested.min(self.max_wait),
                _ => self.delay_for(attempt),
            };

            tracing::warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                label,
                attempt,
                self.max_attempts(),
                error,
                delay
            );

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
