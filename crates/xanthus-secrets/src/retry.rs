//! Bounded retries for reads that may race remote propagation.
//!
//! [`RetryPolicy`] is a small composable policy (attempt budget, delay
//! function, retryable-error predicate). [`ConsistencyRetrier`] applies one to
//! [`KvStore::get`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, SecretError};
use crate::store::KvStore;
use crate::types::AccountContext;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// How many times to try, how long to wait, and which errors to retry.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: DelayFn,
    retryable: fn(&SecretError) -> bool,
}

impl RetryPolicy {
    /// A fixed delay between at most `max_attempts` attempts, retrying
    /// [`SecretError::is_retryable`] errors.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Arc::new(move |_| delay),
            retryable: SecretError::is_retryable,
        }
    }

    /// Replace the delay function. It receives the 1-based number of the
    /// attempt that just failed.
    pub fn with_delay_fn(mut self, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(delay);
        self
    }

    /// Replace the retryable-error predicate.
    pub fn with_predicate(mut self, retryable: fn(&SecretError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        (self.delay)(attempt)
    }

    /// Worst-case wall clock given a per-attempt timeout.
    pub fn worst_case(&self, per_attempt_timeout: Duration) -> Duration {
        let waits: Duration = (1..self.max_attempts).map(|a| self.delay_after(a)).sum();
        per_attempt_timeout * self.max_attempts + waits
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Returns the last error on exhaustion.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !(self.retryable)(&e) => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(operation, attempts = attempt, error = %e, "retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    debug!(operation, attempt, ?delay, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("first_delay", &self.delay_after(1))
            .finish()
    }
}

/// Reads from a [`KvStore`] under a [`RetryPolicy`] to absorb propagation lag.
#[derive(Clone)]
pub struct ConsistencyRetrier {
    store: Arc<dyn KvStore>,
    policy: RetryPolicy,
}

impl ConsistencyRetrier {
    pub fn new(store: Arc<dyn KvStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// [`KvStore::get`] with retries.
    pub async fn get(
        &self,
        ctx: &AccountContext,
        namespace_id: &str,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.policy
            .run("get", |_| self.store.get(ctx, namespace_id, key))
            .await
    }
}
