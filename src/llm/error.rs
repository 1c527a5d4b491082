use std::time::Duration;
use thiserror::Error;

/// Failure modes of a completion request.
///
/// Backends return these inside `anyhow::Error`; callers recover the variant
/// with `err.downcast_ref::<TranslationFailure>()`.
#[derive(Debug, Error)]
pub enum TranslationFailure {
    /// The provider answered but produced no usable text
    #[error("Translation failed: provider returned empty text")]
    EmptyResponse,

    /// The asynchronous job reached a terminal failure state
    #[error("Translation failed: completion job {job_id} reported status {status}")]
    JobFailed { job_id: String, status: String },

    /// The asynchronous job did not reach a terminal state in time
    #[error("Translation failed: completion job {job_id} still pending after {waited:?}")]
    PollTimeout { job_id: String, waited: Duration },

    #[error("Translation failed: completion job {job_id} cancelled")]
    Cancelled { job_id: String },

    /// The run was cancelled before a completion finished
    #[error("Translation interrupted")]
    Interrupted,

    /// Every attempt of the retry policy failed
    #[error("Translation failed after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

impl TranslationFailure {
    /// Whether the failure came from cancelling the run rather than from the provider
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            TranslationFailure::Cancelled { .. } | TranslationFailure::Interrupted
        )
    }
}
