//! Retry decorator with exponential backoff, jitter and a per-send deadline.

use super::Transport;
use crate::error::ExportError;
use crate::response::ExportResponse;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Retries after the first attempt (six attempts in total).
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Backoff before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
/// Upper bound for a single computed backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(5000);
/// Growth factor applied to the backoff after every retry.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;
/// Maximum relative jitter applied to each backoff.
pub const DEFAULT_JITTER: f64 = 0.2;

/// Backoff parameters for [`RetryingTransport`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Cap applied to each computed backoff.
    pub max_backoff: Duration,
    /// Factor the backoff grows by after each retry.
    pub multiplier: f64,
    /// Relative jitter; a backoff is scaled by a factor drawn from `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Checks that the backoff parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidConfiguration`] when the multiplier is
    /// below one or the jitter lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ExportError::InvalidConfiguration(format!(
                "multiplier must be at least 1, got {}",
                self.multiplier
            )));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ExportError::InvalidConfiguration(format!(
                "jitter must be within [0, 1], got {}",
                self.jitter
            )));
        }

        Ok(())
    }
}

/// Source of backoff jitter.
pub trait JitterSource: Send + Sync {
    /// Returns a value in `[-max, max]`.
    fn sample(&self, max: f64) -> f64;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self, max: f64) -> f64 {
        if max.is_nan() || max <= 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(-max..=max)
    }
}

/// Always returns the same jitter, clamped to the requested range.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self, max: f64) -> f64 {
        let max = max.max(0.0);
        self.0.clamp(-max, max)
    }
}

/// Decorator that resends payloads the inner transport reports as retryable.
///
/// Every `send` gets a deadline of `now + timeout`; retries share that budget
/// instead of getting a fresh timeout each. A retry whose delay would overrun
/// the deadline is not attempted and the last retryable response is returned.
///
/// Waits between attempts are registered with the transport so that
/// [`force_flush`](Transport::force_flush) can cut them short.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
    jitter: Box<dyn JitterSource>,
    pending: Mutex<HashMap<u64, CancellationToken>>,
    next_wait_id: AtomicU64,
}

impl<T: Transport> RetryingTransport<T> {
    /// Wraps `inner` with the default retry policy.
    pub fn new(inner: T) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    /// Wraps `inner` with a custom retry policy.
    pub fn with_policy(inner: T, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            jitter: Box::new(RandomJitter),
            pending: Mutex::new(HashMap::new()),
            next_wait_id: AtomicU64::new(0),
        }
    }

    /// Replaces the jitter source.
    pub fn with_jitter(mut self, jitter: impl JitterSource + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Number of sends currently waiting for their next attempt.
    pub fn pending_retries(&self) -> usize {
        self.pending.lock().len()
    }

    fn backoff(&self, next_backoff_ms: f64) -> Duration {
        let max_ms = self.policy.max_backoff.as_millis() as f64;
        let factor = 1.0 + self.jitter.sample(self.policy.jitter);
        let millis = next_backoff_ms * factor;
        let millis = if millis.is_nan() {
            0.0
        } else {
            millis.clamp(0.0, max_ms)
        };
        Duration::from_millis(millis.round() as u64)
    }

    /// Sleeps for `delay`; returns `false` if a flush cancelled the wait.
    async fn wait_for_retry(&self, delay: Duration) -> bool {
        let wait = PendingWait::register(self);

        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = wait.token.cancelled() => false,
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, data: Bytes, timeout: Duration) -> Result<ExportResponse, ExportError> {
        let deadline = Instant::now() + timeout;
        let mut response = self.inner.send(data.clone(), timeout).await?;

        let mut attempts_remaining = self.policy.max_retries;
        let mut next_backoff_ms = self.policy.initial_backoff.as_millis() as f64;

        while response.is_retryable() && attempts_remaining > 0 {
            attempts_remaining -= 1;

            let backoff = self.backoff(next_backoff_ms);
            next_backoff_ms *= self.policy.multiplier;

            let delay = response.retry_in().unwrap_or(backoff);
            let remaining = deadline.saturating_duration_since(Instant::now());
            if delay > remaining {
                tracing::debug!(
                    delay_ms = delay.as_millis() as u64,
                    remaining_ms = remaining.as_millis() as u64,
                    "Retry would exceed the export deadline, giving up"
                );
                return Ok(response);
            }

            tracing::debug!(
                retry = self.policy.max_retries - attempts_remaining,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = response.error().map(tracing::field::display),
                "Export attempt was retryable, scheduling retry"
            );

            if !self.wait_for_retry(delay).await {
                tracing::debug!("Pending retry cancelled by flush");
                return Ok(ExportResponse::retryable(Some(ExportError::RetryCancelled)));
            }

            // The attempt keeps the budget measured before the wait.
            response = self.inner.send(data.clone(), remaining).await?;
        }

        Ok(response)
    }

    fn force_flush(&self) {
        self.inner.force_flush();

        let cancelled: Vec<CancellationToken> =
            self.pending.lock().drain().map(|(_, token)| token).collect();
        if !cancelled.is_empty() {
            tracing::debug!(count = cancelled.len(), "Cancelling pending retries");
        }
        for token in cancelled {
            token.cancel();
        }
    }

    fn shutdown(&self) {
        self.inner.shutdown();
    }
}

/// Registration of one retry wait; deregisters itself when dropped.
struct PendingWait<'a, T> {
    transport: &'a RetryingTransport<T>,
    id: u64,
    token: CancellationToken,
}

impl<'a, T> PendingWait<'a, T> {
    fn register(transport: &'a RetryingTransport<T>) -> Self {
        let id = transport.next_wait_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        transport.pending.lock().insert(id, token.clone());
        Self {
            transport,
            id,
            token,
        }
    }
}

impl<T> Drop for PendingWait<'_, T> {
    fn drop(&mut self) {
        // Already gone if a flush cancelled this wait.
        self.transport.pending.lock().remove(&self.id);
    }
}
