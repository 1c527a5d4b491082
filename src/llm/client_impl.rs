use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::LlmClient;
use super::error::TranslationFailure;
use crate::util::SecretString;

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl ChatMessage {
    fn user(prompt: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(prompt.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

// ============================================================================
// OpenAI Client (also serves the credential-free aggregator endpoint)
// ============================================================================

pub struct OpenAIClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIClient {
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
        };

        debug!(
            "Calling OpenAI-compatible API at {} with model: {}",
            self.base_url, self.model
        );

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request);

        // The aggregator endpoint runs without credentials
        if !self.api_key.is_empty() {
            req = req.header("authorization", format!("Bearer {}", self.api_key.expose()));
        }

        let response = req
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, error_text);
        }

        let api_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .context("No choices in OpenAI response")?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

// ============================================================================
// Zhipu AI Client (asynchronous job, polled until terminal)
// ============================================================================

pub struct ZhipuaiClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    poll_interval: Duration,
    poll_max_wait: Duration,
    cancel: CancellationToken,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ZhipuaiJob {
    id: String,
    #[serde(default)]
    task_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZhipuaiJobResult {
    #[serde(default)]
    task_status: String,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// Where a job stands after one status query
#[derive(Debug, PartialEq, Eq)]
enum JobState {
    Succeeded,
    Failed,
    Pending,
}

fn job_state(task_status: &str) -> JobState {
    match task_status {
        "SUCCESS" => JobState::Succeeded,
        "FAIL" | "FAILED" => JobState::Failed,
        _ => JobState::Pending,
    }
}

impl ZhipuaiClient {
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(500),
            poll_max_wait: Duration::from_secs(600),
            cancel: CancellationToken::new(),
            client: build_http_client(timeout_secs)?,
        })
    }

    pub fn with_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_max_wait = max_wait;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn submit(&self, prompt: &str) -> Result<ZhipuaiJob> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
        };

        let response = self
            .client
            .post(format!("{}/async/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .context("Failed to submit Zhipu AI completion job")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Zhipu AI API error {}: {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse Zhipu AI job submission response")
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ZhipuaiJobResult> {
        let response = self
            .client
            .get(format!("{}/async-result/{}", self.base_url, job_id))
            .bearer_auth(self.api_key.expose())
            .send()
            .await
            .context("Failed to query Zhipu AI job status")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Zhipu AI API error {}: {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse Zhipu AI job result")
    }

    /// Poll until the job is terminal, the wait budget runs out, or the run is cancelled
    async fn wait_for_job(&self, job_id: &str) -> Result<String> {
        let started = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                return Err(TranslationFailure::Cancelled {
                    job_id: job_id.to_string(),
                }
                .into());
            }

            let result = self.fetch_result(job_id).await?;
            match job_state(&result.task_status) {
                JobState::Succeeded => {
                    return Ok(result
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.message.content)
                        .unwrap_or_default());
                }
                JobState::Failed => {
                    return Err(TranslationFailure::JobFailed {
                        job_id: job_id.to_string(),
                        status: result.task_status,
                    }
                    .into());
                }
                JobState::Pending => {
                    debug!("Job {} status: {}", job_id, result.task_status);
                }
            }

            let waited = started.elapsed();
            if waited >= self.poll_max_wait {
                return Err(TranslationFailure::PollTimeout {
                    job_id: job_id.to_string(),
                    waited,
                }
                .into());
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(TranslationFailure::Cancelled {
                        job_id: job_id.to_string(),
                    }
                    .into());
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[async_trait]
impl LlmClient for ZhipuaiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!("Calling Zhipu AI async API with model: {}", self.model);

        let job = self.submit(prompt).await?;
        debug!(
            "Submitted job {} (status: {})",
            job.id,
            job.task_status.as_deref().unwrap_or("unknown")
        );

        self.wait_for_job(&job.id).await
    }
}

// ============================================================================
// Tests
// ============================================================================
