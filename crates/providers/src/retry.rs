//! Provider retry: bounded attempts with exponential backoff.
//!
//! Transient failures (rate limits, network errors, timeouts, 5xx) are
//! retried against the same provider. Anything else, and the error of the
//! final attempt, is returned to the caller unchanged.

use async_trait::async_trait;
use personabot_core::error::ProviderError;
use personabot_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Growth factor applied per further failure.
    pub multiplier: f64,
    /// Ceiling for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &personabot_config::RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay to wait after `failed_attempt` (1-based) fails.
    pub fn backoff_after(&self, failed_attempt: u32) -> Duration {
        let mut secs = self.initial_backoff.as_secs_f64();
        for _ in 1..failed_attempt {
            secs *= self.multiplier;
        }
        let capped = secs.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_backoff
        }
    }
}

/// A provider that retries its inner provider on transient failures.
pub struct RetryProvider {
    inner: Arc<dyn personabot_core::Provider>,
    policy: RetryPolicy,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn personabot_core::Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl personabot_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!(
                            provider = %self.inner.name(),
                            attempt,
                            "Completion succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff_after(attempt);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        transient = e.is_transient(),
                        error = %e,
                        "Provider failed, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use personabot_core::Provider;
    use personabot_core::message::Message;
    use std::sync::Mutex;

    /// A mock provider that plays back scripted outcomes, then succeeds.
    struct ScriptedProvider {
        outcomes: Mutex<Vec<ProviderError>>,
        call_count: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn failing_with(errors: Vec<ProviderError>) -> Self {
            Self {
                outcomes: Mutex::new(errors),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl personabot_core::Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Ok(ProviderResponse {
                    message: Message::assistant("success"),
                    usage: None,
                    model: "test-model".into(),
                });
            }
            Err(outcomes.remove(0))
        }
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest {
            model: "test".into(),
            messages: vec![Message::user("hello")],
            temperature: 0.7,
            max_tokens: None,
        }
    }

    fn rate_limited() -> ProviderError {
        ProviderError::RateLimited {
            retry_after_secs: 1,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_after(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_after(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_after(10), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_succeeds() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![]));
        let provider = RetryProvider::new(inner.clone(), RetryPolicy::default());

        let result = provider.complete(test_request()).await;
        assert_eq!(result.unwrap().message.content, "success");
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_transient_failures_then_success() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![
            rate_limited(),
            ProviderError::Network("connection reset".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let result = provider.complete(test_request()).await;
        assert!(result.is_ok());
        assert_eq!(inner.calls(), 3);
        // 2s + 4s of (virtual) backoff
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![
            rate_limited(),
            rate_limited(),
            ProviderError::Timeout("slow".into()),
            rate_limited(),
        ]));
        let provider = RetryProvider::new(inner.clone(), RetryPolicy::default());

        let result = provider.complete(test_request()).await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_is_not_retried() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![
            ProviderError::QuotaExceeded("insufficient_quota".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), RetryPolicy::default());

        let result = provider.complete(test_request()).await;
        assert!(result.unwrap_err().is_quota());
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_on_final_attempt_surfaces() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![
            rate_limited(),
            rate_limited(),
            ProviderError::QuotaExceeded("insufficient_quota".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), RetryPolicy::default());

        let err = provider.complete(test_request()).await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_retries() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![rate_limited()]));
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let provider = RetryProvider::new(inner.clone(), policy);

        assert!(provider.complete(test_request()).await.is_err());
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from_config(&personabot_config::RetryConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(2000));
        assert_eq!(policy.max_backoff, Duration::from_millis(8000));
    }
}
