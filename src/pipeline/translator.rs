use anyhow::Result;
use std::collections::BTreeMap;
use tracing::info;

use crate::llm::client::LlmClient;
use crate::llm::prompts;

pub struct Translator {
    client: Box<dyn LlmClient>,
    labels: BTreeMap<String, String>,
}

impl Translator {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self {
            client,
            labels: BTreeMap::new(),
        }
    }

    /// Display names substituted for language codes in the prompt
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn label_for<'a>(&'a self, target_language: &'a str) -> &'a str {
        self.labels
            .get(target_language)
            .map(String::as_str)
            .unwrap_or(target_language)
    }

    /// Translate one Markdown document. The model's answer is returned untouched.
    pub async fn translate(&self, content: &str, target_language: &str) -> Result<String> {
        let prompt = prompts::translation_prompt(content, self.label_for(target_language));
        let response = self.client.complete(&prompt).await?;
        info!("Translation Response:\n{}", response);
        Ok(response)
    }
}
