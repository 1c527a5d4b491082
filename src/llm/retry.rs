use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::client::LlmClient;
use super::error::TranslationFailure;

/// Wraps a backend with a bounded retry policy.
///
/// An attempt fails when the backend errors or answers with blank text.
/// Attempts run back to back; after `max_attempts` failures the last cause is
/// reported as [`TranslationFailure::Exhausted`].
///
/// Cancellation is never retried: once the token fires, the attempt in flight
/// is dropped and [`TranslationFailure::Interrupted`] is returned.
pub struct RetryingClient {
    inner: Box<dyn LlmClient>,
    max_attempts: usize,
    cancel: CancellationToken,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn LlmClient>, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

#[async_trait]
impl LlmClient for RetryingClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(TranslationFailure::Interrupted.into());
            }

            let completion = tokio::select! {
                _ = self.cancel.cancelled() => return Err(TranslationFailure::Interrupted.into()),
                completion = self.inner.complete(prompt) => completion,
            };

            let outcome = match completion {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => anyhow::Error::from(TranslationFailure::EmptyResponse),
                Err(e) => e,
            };

            if outcome
                .downcast_ref::<TranslationFailure>()
                .is_some_and(TranslationFailure::is_cancellation)
            {
                return Err(outcome);
            }

            warn!(
                "Completion attempt {}/{} failed: {:#}",
                attempt, self.max_attempts, outcome
            );
            last_error = format!("{:#}", outcome);
        }

        Err(TranslationFailure::Exhausted {
            attempts: self.max_attempts,
            last_error,
        }
        .into())
    }
}
