//! Bounded condition polling
//!
//! UI state is observed by polling a condition with a capped exponential
//! backoff until it holds or a deadline passes. Fixed settle delays are kept
//! only as tunable minimums in front of these polls.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{BackoffSettings, Timings};
use crate::{Error, Result};

/// Capped exponential backoff between polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Backoff {
    /// Delay to use after `current`
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(self.factor.max(1)).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        BackoffSettings::default().into()
    }
}

impl From<BackoffSettings> for Backoff {
    fn from(settings: BackoffSettings) -> Self {
        Self {
            initial: Duration::from_millis(settings.initial_ms),
            max: Duration::from_millis(settings.max_ms.max(settings.initial_ms)),
            factor: settings.factor,
        }
    }
}

/// Deadline plus backoff for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub backoff: Backoff,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, backoff: Backoff) -> Self {
        Self { timeout, backoff }
    }
}

impl Timings {
    /// Policy for an arbitrary deadline using the configured backoff
    pub fn wait(&self, timeout: Duration) -> WaitPolicy {
        WaitPolicy::new(timeout, self.poll.into())
    }

    /// Policy for ordinary selector waits
    pub fn selector_wait(&self) -> WaitPolicy {
        self.wait(self.selector_timeout())
    }
}

/// Poll `check` until it yields a value or the deadline passes.
///
/// `check` runs at least once. Transient page errors (see
/// [`Error::is_transient`]) count as "not yet"; any other error aborts the
/// wait. On deadline the result is `Error::Timeout` naming `what`.
pub async fn poll_until<T, F, Fut>(policy: WaitPolicy, what: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let mut delay = policy.backoff.initial;

    loop {
        match check().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) if e.is_transient() => debug!(error = %e, what, "Page not ready"),
            Err(e) => return Err(e),
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(Error::Timeout(format!(
                "{} (gave up after {} ms)",
                what,
                policy.timeout.as_millis()
            )));
        }

        tokio::time::sleep(delay.min(policy.timeout - elapsed)).await;
        delay = policy.backoff.next(delay);
    }
}

/// Like `poll_until` for a boolean condition, but a deadline is `Ok(false)`
pub async fn probe<F, Fut>(policy: WaitPolicy, what: &str, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let outcome = poll_until(policy, what, || {
        let fut = check();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await;

    match outcome {
        Ok(()) => Ok(true),
        Err(Error::Timeout(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Sleep for a tunable minimum settle delay; zero skips the timer entirely
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
