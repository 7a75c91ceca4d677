//! Exponential backoff with an elapsed-time budget.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::error::GraphError;

/// Backoff settings for one retry cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub initial_interval: Duration,
    /// Growth factor applied to the delay after every failure.
    pub multiplier: f64,
    /// Upper bound for a single delay.
    pub max_interval: Duration,
    /// Give up once the next attempt would start after this much time.
    pub max_elapsed_time: Duration,
}

impl BackoffPolicy {
    /// Policy for regular API requests: 6s initial interval, 10 minute budget.
    #[must_use]
    pub const fn requests() -> Self {
        Self {
            initial_interval: Duration::from_secs(6),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: Duration::from_secs(10 * 60),
        }
    }

    /// Policy for file uploads: 6s initial interval, 5 minute budget.
    #[must_use]
    pub const fn uploads() -> Self {
        Self {
            max_elapsed_time: Duration::from_secs(5 * 60),
            ..Self::requests()
        }
    }

    #[must_use]
    pub const fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_elapsed_time(mut self, budget: Duration) -> Self {
        self.max_elapsed_time = budget;
        self
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::requests()
    }
}

/// Stateful delay generator for one retry cycle.
#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    current: Duration,
    started: Instant,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.initial_interval,
            started: Instant::now(),
        }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.current.min(self.policy.max_interval);
        if self.started.elapsed().saturating_add(delay) > self.policy.max_elapsed_time {
            return None;
        }
        self.current = scale(self.current, self.policy.multiplier).min(self.policy.max_interval);
        Some(delay)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn scale(interval: Duration, factor: f64) -> Duration {
    Duration::from_nanos((interval.as_nanos() as f64 * factor) as u64)
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects,
/// the backoff budget is spent, or `ctx` is cancelled.
///
/// `op` receives the 1-based attempt number. On exhaustion the last error is
/// returned.
///
/// # Errors
/// Returns the last error of `op`, or [`GraphError::Cancelled`] if the
/// context was cancelled while waiting.
pub async fn retry<T, F, Fut, P>(
    ctx: &CallContext,
    policy: BackoffPolicy,
    should_retry: P,
    mut op: F,
) -> Result<T, GraphError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GraphError>>,
    P: Fn(&GraphError) -> bool,
{
    let mut backoff = ExponentialBackoff::new(policy);
    let mut attempt = 0_u32;
    loop {
        attempt = attempt.saturating_add(1);
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if matches!(err, GraphError::Cancelled) || !should_retry(&err) {
            return Err(err);
        }
        let Some(delay) = backoff.next_backoff() else {
            warn!(attempt, error = %err, "giving up after exhausting the retry budget");
            return Err(err);
        };
        debug!(attempt, ?delay, error = %err, "attempt failed, retrying");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = ctx.cancellation().cancelled() => return Err(GraphError::Cancelled),
        }
    }
}
