use crate::config::IngestConfig;
use crate::error::IsRetryable;
use backon::{BackoffBuilder, Retryable};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential delay with additive jitter: `base * 2^n + rand(0..max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_jitter: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
            max_retries: 3,
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(cfg: &IngestConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_jitter: Duration::from_millis(cfg.max_jitter_ms),
            max_retries: cfg.max_retries,
        }
    }

    /// Retries immediately; used where waiting would only slow things down.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            max_retries,
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl BackoffBuilder for BackoffPolicy {
    type Backoff = ExponentialJitter;

    fn build(self) -> Self::Backoff {
        ExponentialJitter {
            policy: self,
            attempt: 0,
        }
    }
}

/// Delay iterator produced by [`BackoffPolicy`]; yields `max_retries` delays then stops.
#[derive(Debug, Clone)]
pub struct ExponentialJitter {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Iterator for ExponentialJitter {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_retries {
            return None;
        }
        let base = self.policy.base_delay_for(self.attempt);
        self.attempt += 1;

        let jitter_ms = u64::try_from(self.policy.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        Some(base.saturating_add(jitter))
    }
}

/// Result of [`with_backoff`] plus how many retries were spent getting there.
#[derive(Debug)]
pub struct BackoffOutcome<T, E> {
    pub result: Result<T, E>,
    pub retries: u32,
}

impl<T, E> BackoffOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs `op`, retrying while its error is retryable and the policy has delays left.
///
/// Permanent errors return at once; exhaustion returns the last error. Neither panics
/// nor escapes as anything other than a failed outcome.
pub async fn with_backoff<T, E, F, Fut>(
    policy: BackoffPolicy,
    label: &str,
    op: F,
) -> BackoffOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + Display,
{
    let mut retries = 0u32;
    let result = op
        .retry(policy)
        .when(|e: &E| e.is_retryable())
        .notify(|err, dur: Duration| {
            retries += 1;
            warn!(
                op = label,
                retries,
                error = %err,
                delay = ?dur,
                "Retrying after transient error"
            );
        })
        .await;

    BackoffOutcome { result, retries }
}
