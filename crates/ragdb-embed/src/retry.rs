use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::LlmProvider;

const MAX_BACKOFF_EXPONENT: u32 = 5;

/// Per-attempt timeout plus bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), max_retries: 3, backoff: Duration::from_millis(500) }
    }
}

impl From<&EmbeddingSettings> for RetryPolicy {
    fn from(s: &EmbeddingSettings) -> Self {
        Self { timeout: Duration::from_secs(s.timeout_secs), max_retries: s.max_retries, backoff: Duration::from_millis(s.backoff_ms) }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `retry` (0-based): `backoff * 2^retry`, exponent capped at 5.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff * (1u32 << retry.min(MAX_BACKOFF_EXPONENT))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// `max_retries` further attempts are used up.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.delay_for(attempt - 1)).await;
            }
            let err = match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout(self.timeout),
            };
            warn!(op = what, attempt = attempt + 1, error = %err, "provider call failed");
            last_err = Some(err);
        }
        Err(last_err.unwrap_or(Error::Timeout(self.timeout)))
    }
}

/// An [`LlmProvider`] whose calls go through a [`RetryPolicy`].
pub struct Resilient {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl Resilient {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self { Self { inner, policy } }
    pub fn policy(&self) -> &RetryPolicy { &self.policy }
}

#[async_trait]
impl LlmProvider for Resilient {
    fn model_id(&self) -> &str { self.inner.model_id() }
    fn dim(&self) -> usize { self.inner.dim() }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.policy.run("embed", || self.inner.embed(texts)).await
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.policy.run("complete", || self.inner.complete(system, user)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_is_capped() {
        let p = RetryPolicy { backoff: Duration::from_millis(10), ..RetryPolicy::default() };
        assert_eq!(p.delay_for(0), Duration::from_millis(10));
        assert_eq!(p.delay_for(2), Duration::from_millis(40));
        assert_eq!(p.delay_for(5), Duration::from_millis(320));
        assert_eq!(p.delay_for(9), Duration::from_millis(320));
    }
}
