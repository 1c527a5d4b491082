//! Fan-out of translation tasks: one per (changed document, target language)

use anyhow::{Context, Result};
use futures::future::{join_all, try_join_all};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use super::translator::Translator;
use crate::config::{FailurePolicy, TranslateConfig};
use crate::detector::{self, ChangedFile, Detection, History, SkipReason};

/// One unit of work. Owns everything it needs so tasks never share loop state.
#[derive(Debug, Clone)]
pub struct TranslationTask {
    pub source: ChangedFile,
    pub language: String,
    /// Output path relative to the repository root
    pub output: String,
    pub content: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub source: ChangedFile,
    pub language: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// Set when detection decided there was nothing to do
    pub skipped: Option<SkipReason>,
    /// Output files written, in task order
    pub written: Vec<PathBuf>,
    /// Only populated under [`FailurePolicy::Collect`]
    pub failures: Vec<TaskFailure>,
}

impl RunReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Swap the source root prefix for the target root.
/// Paths outside the source root are returned unchanged.
pub fn output_path(source: &str, source_root: &str, target_root: &str) -> String {
    match source.strip_prefix(source_root) {
        Some(rest) => format!("{}{}", target_root, rest),
        None => source.to_string(),
    }
}

/// Pair every document with every language, at most once per pair
pub fn plan_tasks(
    documents: &[(ChangedFile, Arc<str>)],
    config: &TranslateConfig,
) -> Vec<TranslationTask> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut tasks = Vec::new();

    for (source, content) in documents {
        for language in &config.languages {
            if !seen.insert((source.as_str(), language.as_str())) {
                continue;
            }
            tasks.push(TranslationTask {
                source: source.clone(),
                language: language.clone(),
                output: output_path(
                    source.as_str(),
                    &config.source_root,
                    &config.target_root_for(language),
                ),
                content: Arc::clone(content),
            });
        }
    }
    tasks
}

pub struct Orchestrator {
    translator: Translator,
    config: TranslateConfig,
    repo: PathBuf,
}

impl Orchestrator {
    pub fn new(translator: Translator, config: TranslateConfig, repo: impl Into<PathBuf>) -> Self {
        Self {
            translator,
            config,
            repo: repo.into(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Detect changed documents and translate each into every configured language
    pub async fn run(&self, history: &dyn History) -> Result<RunReport> {
        match detector::detect_changed_documents(history, &self.config).await {
            Detection::Skip(reason) => Ok(RunReport::skipped(reason)),
            Detection::Changed(documents) => self.translate_documents(&documents).await,
        }
    }

    pub async fn translate_documents(&self, documents: &[ChangedFile]) -> Result<RunReport> {
        if documents.is_empty() {
            info!("No relevant files changed for translation.");
            return Ok(RunReport::default());
        }

        let mut loaded = Vec::with_capacity(documents.len());
        for source in documents {
            info!("Processing changed file: {}", source);
            let path = self.repo.join(source.as_str());
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            loaded.push((source.clone(), Arc::<str>::from(content)));
        }

        let tasks = plan_tasks(&loaded, &self.config);
        info!(
            "Launching {} translation task(s) ({} file(s) x {} language(s), policy: {})",
            tasks.len(),
            loaded.len(),
            self.config.languages.len(),
            self.config.failure_policy.as_str()
        );

        match self.config.failure_policy {
            FailurePolicy::FailFast => {
                // Dropping the joint future on the first error cancels the siblings
                let written = try_join_all(tasks.into_iter().map(|t| self.execute_task(t))).await?;
                Ok(RunReport {
                    written,
                    ..RunReport::default()
                })
            }
            FailurePolicy::Collect => {
                let labelled: Vec<(ChangedFile, String)> = tasks
                    .iter()
                    .map(|t| (t.source.clone(), t.language.clone()))
                    .collect();
                let outcomes = join_all(tasks.into_iter().map(|t| self.execute_task(t))).await;

                let mut report = RunReport::default();
                for ((source, language), outcome) in labelled.into_iter().zip(outcomes) {
                    match outcome {
                        Ok(path) => report.written.push(path),
                        Err(e) => {
                            error!("Translating {} to {} failed: {:#}", source, language, e);
                            report.failures.push(TaskFailure {
                                source,
                                language,
                                error: format!("{:#}", e),
                            });
                        }
                    }
                }
                Ok(report)
            }
        }
    }

    /// Translate one document into one language and write the result
    pub async fn execute_task(&self, task: TranslationTask) -> Result<PathBuf> {
        let output = self.repo.join(&task.output);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let translated = self
            .translator
            .translate(&task.content, &task.language)
            .await
            .with_context(|| format!("Translating {} to {}", task.source, task.language))?;

        tokio::fs::write(&output, translated)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Translated content written to {}", output.display());

        Ok(output)
    }
}
