use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::client::{LlmClient, MockLlmClient};
use super::client_impl::{OpenAIClient, ZhipuaiClient};
use super::retry::RetryingClient;
use crate::config::{Config, Credentials};

/// The completion backend used for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Zhipu AI asynchronous jobs (needs the Zhipu credential)
    Zhipuai,
    /// OpenAI chat completions (needs the OpenAI credential)
    OpenAI,
    /// Credential-free OpenAI-compatible aggregator
    Fallback,
}

impl Backend {
    pub fn as_str(&self) -> &str {
        match self {
            Backend::Zhipuai => "zhipuai",
            Backend::OpenAI => "openai",
            Backend::Fallback => "fallback",
        }
    }
}

/// Pick the backend by credential priority: Zhipu AI, then OpenAI, then the fallback
pub fn select_backend(credentials: &Credentials) -> Backend {
    if credentials.zhipuai.is_some() {
        Backend::Zhipuai
    } else if credentials.openai.is_some() {
        Backend::OpenAI
    } else {
        Backend::Fallback
    }
}

/// Build the bare backend client, without retries
pub fn create_backend(config: &Config, cancel: CancellationToken) -> Result<Box<dyn LlmClient>> {
    let llm = &config.llm;
    let timeout = llm.request_timeout_secs;

    match select_backend(&config.credentials) {
        Backend::Zhipuai => {
            let api_key = config
                .credentials
                .zhipuai
                .as_ref()
                .map(|k| k.expose().to_string())
                .unwrap_or_default();
            let client = ZhipuaiClient::with_base_url(
                api_key,
                llm.zhipuai.model.clone(),
                llm.zhipuai.base_url.clone(),
                timeout,
            )?
            .with_polling(llm.zhipuai.poll_interval(), llm.zhipuai.poll_max_wait())
            .with_cancellation(cancel);
            Ok(Box::new(client))
        }

        Backend::OpenAI => {
            let api_key = config
                .credentials
                .openai
                .as_ref()
                .map(|k| k.expose().to_string())
                .unwrap_or_default();
            Ok(Box::new(OpenAIClient::with_base_url(
                api_key,
                llm.openai.model.clone(),
                llm.openai.base_url.clone(),
                timeout,
            )?))
        }

        Backend::Fallback => Ok(Box::new(OpenAIClient::with_base_url(
            String::new(),
            llm.fallback.model.clone(),
            llm.fallback.base_url.clone(),
            timeout,
        )?)),
    }
}

/// Create the completion client for a run: the selected backend wrapped in the retry policy
pub fn create_client(
    config: &Config,
    dry_run: bool,
    cancel: CancellationToken,
) -> Result<Box<dyn LlmClient>> {
    let backend: Box<dyn LlmClient> = if dry_run {
        info!("Using mock LLM client (dry run)");
        Box::new(MockLlmClient::new())
    } else {
        let backend = select_backend(&config.credentials);
        info!("Using {}.", backend.as_str());
        create_backend(config, cancel.clone())?
    };

    Ok(Box::new(
        RetryingClient::new(backend, config.llm.max_attempts).with_cancellation(cancel),
    ))
}
