use anyhow::Result;
use async_trait::async_trait;

use super::prompts::SEPARATOR;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Offline client for `--dry-run`: answers a translation prompt with the
/// document block it was given, so the pipeline writes the source text through.
pub struct MockLlmClient;

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut blocks = prompt.split(SEPARATOR);
        let _instructions = blocks.next();
        match blocks.next() {
            Some(body) => Ok(body.trim_matches('\n').to_string()),
            None => Ok(prompt.to_string()),
        }
    }
}
