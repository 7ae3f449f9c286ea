//! Bounded retry and model fallback
//!
//! - [`RetryingGenerator`] retries capacity errors on one model with linear
//!   backoff (`base_delay * attempt`)
//! - [`FallbackGenerator`] walks an ordered list of models, moving on only
//!   when a model fails transiently

use crate::error::GenAiError;
use crate::service::{GenerationService, Prompt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Retry budget for capacity errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `n` is `base_delay * n`
    #[serde(with = "millis")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Wait after failed attempt number `attempt` (1-based)
    #[inline]
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Serde helper storing durations as integer milliseconds
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Retries capacity errors on the wrapped service
#[derive(Debug, Clone)]
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: GenerationService> RetryingGenerator<G> {
    #[must_use]
    pub const fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[inline]
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<G: GenerationService> GenerationService for RetryingGenerator<G> {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenAiError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_capacity() => {
                    if attempt >= max_attempts {
                        tracing::warn!(model = self.inner.name(), attempts = attempt, "Model still overloaded, giving up");
                        return Err(GenAiError::Exhausted {
                            model: self.inner.name().to_owned(),
                            attempts: attempt,
                        });
                    }
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        model = self.inner.name(),
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Model overloaded, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Tries each service in order until one succeeds or fails terminally
#[derive(Clone)]
pub struct FallbackGenerator {
    chain: Vec<Arc<dyn GenerationService>>,
}

impl FallbackGenerator {
    #[must_use]
    pub fn new(chain: Vec<Arc<dyn GenerationService>>) -> Self {
        Self { chain }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl std::fmt::Debug for FallbackGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.chain.iter().map(|g| g.name())).finish()
    }
}

#[async_trait]
impl GenerationService for FallbackGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenAiError> {
        let mut last = GenAiError::NotConfigured("no models configured".into());
        for (position, service) in self.chain.iter().enumerate() {
            match service.generate(prompt).await {
                Ok(text) => {
                    if position > 0 {
                        tracing::info!(model = service.name(), "Fallback model succeeded");
                    }
                    return Ok(text);
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(model = service.name(), error = %err, "Model failed, trying next");
                    last = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }

    fn name(&self) -> &str {
        self.chain.first().map_or("fallback", |g| g.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scripted::Scripted;

    mod scripted {
        use super::*;
        use std::collections::VecDeque;
        use std::sync::Mutex;

        pub(super) struct Scripted {
            pub(super) name: &'static str,
            pub(super) replies: Mutex<VecDeque<Result<String, GenAiError>>>,
            pub(super) calls: Mutex<u32>,
        }

        impl Scripted {
            pub(super) fn new(name: &'static str, replies: Vec<Result<String, GenAiError>>) -> Self {
                Self {
                    name,
                    replies: Mutex::new(replies.into()),
                    calls: Mutex::new(0),
                }
            }

            pub(super) fn calls(&self) -> u32 {
                *self.calls.lock().unwrap()
            }
        }

        #[async_trait]
        impl GenerationService for Scripted {
            async fn generate(&self, _prompt: &Prompt) -> Result<String, GenAiError> {
                *self.calls.lock().unwrap() += 1;
                self.replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(Err(GenAiError::EmptyResponse))
            }

            fn name(&self) -> &str {
                self.name
            }
        }
    }

    fn overloaded() -> Result<String, GenAiError> {
        Err(GenAiError::Overloaded { model: "m".into() })
    }

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_capacity_errors_then_succeeds() {
        let inner = Arc::new(Scripted::new("m", vec![overloaded(), overloaded(), Ok("done".into())]));
        let retrying = RetryingGenerator::new(inner.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let text = retrying.generate(&Prompt::text("x")).await.unwrap();
        assert_eq!(text, "done");
        assert_eq!(inner.calls(), 3);
        // 1s after the first failure, 2s after the second
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(Scripted::new("m", vec![overloaded(), overloaded(), overloaded(), Ok("late".into())]));
        let retrying = RetryingGenerator::new(inner.clone(), RetryPolicy::default());
        let err = retrying.generate(&Prompt::text("x")).await.unwrap_err();
        assert_eq!(
            err,
            GenAiError::Exhausted {
                model: "m".into(),
                attempts: 3
            }
        );
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let inner = Arc::new(Scripted::new("m", vec![Err(GenAiError::Unauthorized), Ok("never".into())]));
        let retrying = RetryingGenerator::new(inner.clone(), RetryPolicy::default());
        assert_eq!(retrying.generate(&Prompt::text("x")).await, Err(GenAiError::Unauthorized));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_moves_on_only_for_transient_failures() {
        let first = Arc::new(Scripted::new("a", vec![Err(GenAiError::Timeout)]));
        let second = Arc::new(Scripted::new("b", vec![Ok("from b".into())]));
        let services: Vec<Arc<dyn GenerationService>> = vec![first, second];
        let chain = FallbackGenerator::new(services);
        assert_eq!(chain.generate(&Prompt::text("x")).await.unwrap(), "from b");

        let first = Arc::new(Scripted::new(
            "a",
            vec![Err(GenAiError::Http {
                status: 400,
                body: "bad".into(),
            })],
        ));
        let second = Arc::new(Scripted::new("b", vec![Ok("unused".into())]));
        let services: Vec<Arc<dyn GenerationService>> = vec![first, second.clone()];
        let chain = FallbackGenerator::new(services);
        assert!(matches!(
            chain.generate(&Prompt::text("x")).await,
            Err(GenAiError::Http { status: 400, .. })
        ));
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let chain = FallbackGenerator::new(Vec::new());
        assert!(matches!(
            chain.generate(&Prompt::text("x")).await,
            Err(GenAiError::NotConfigured(_))
        ));
    }
}
