//! Change detection: which source documents did the latest commit touch?

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::TranslateConfig;
use crate::util::run_cmd_with_timeout;

/// A source document path, relative to the repository root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangedFile(String);

impl ChangedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The latest commit is itself an automated translation
    AutomatedCommit,
    /// The change list could not be read (first commit, not a repo, git missing)
    HistoryUnavailable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AutomatedCommit => write!(f, "Auto translated, skipping..."),
            SkipReason::HistoryUnavailable(why) => write!(f, "No files changed. ({})", why),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Skip(SkipReason),
    /// Matching documents; may be empty when the commit touched nothing relevant
    Changed(Vec<ChangedFile>),
}

/// Read-only view of version-control history
#[async_trait]
pub trait History: Send + Sync {
    /// Subject line of the most recent commit
    async fn last_commit_subject(&self) -> Result<String>;

    /// Paths changed between the previous and the current commit.
    /// `Err` when the query itself fails.
    async fn changed_paths(&self) -> Result<Vec<String>>;
}

/// [`History`] backed by the `git` command line
pub struct GitHistory {
    repo: PathBuf,
    timeout: Duration,
}

impl GitHistory {
    pub fn new(repo: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo: repo.into(),
            timeout,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.repo);
        let output = run_cmd_with_timeout(cmd, self.timeout)
            .await
            .with_context(|| format!("git {}", args.join(" ")))?;

        if !output.status.success() {
            anyhow::bail!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        String::from_utf8(output.stdout).context("git produced non-UTF-8 output")
    }
}

#[async_trait]
impl History for GitHistory {
    async fn last_commit_subject(&self) -> Result<String> {
        let stdout = self.git(&["show", "-s", "--format=%s"]).await?;
        Ok(stdout.trim().to_string())
    }

    async fn changed_paths(&self) -> Result<Vec<String>> {
        // -z keeps non-ASCII paths verbatim instead of C-quoting them
        let stdout = self
            .git(&["diff", "--name-only", "-z", "HEAD~1", "HEAD"])
            .await?;
        Ok(split_nul(&stdout))
    }
}

fn split_nul(stdout: &str) -> Vec<String> {
    stdout
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep paths under the source root with the documentation extension.
/// Order is preserved; duplicates and blank lines are dropped.
pub fn filter_documents<S: AsRef<str>>(
    paths: &[S],
    source_root: &str,
    extension: &str,
) -> Vec<ChangedFile> {
    let mut documents: Vec<ChangedFile> = Vec::new();
    for path in paths {
        let path = path.as_ref().trim_end_matches('\r');
        if path.is_empty() || !path.starts_with(source_root) || !path.ends_with(extension) {
            continue;
        }
        let file = ChangedFile::new(path);
        if !documents.contains(&file) {
            documents.push(file);
        }
    }
    documents
}

/// Decide what the latest commit asks us to translate
pub async fn detect_changed_documents(
    history: &dyn History,
    config: &TranslateConfig,
) -> Detection {
    match history.last_commit_subject().await {
        Ok(subject) if subject == config.skip_subject => {
            info!("{}", SkipReason::AutomatedCommit);
            return Detection::Skip(SkipReason::AutomatedCommit);
        }
        Ok(subject) => debug!("Last commit: {}", subject),
        Err(e) => warn!("Could not read last commit subject: {:#}", e),
    }

    let paths = match history.changed_paths().await {
        Ok(paths) => paths,
        Err(e) => {
            let reason = SkipReason::HistoryUnavailable(format!("{:#}", e));
            info!("{}", reason);
            return Detection::Skip(reason);
        }
    };

    let documents = filter_documents(paths.as_slice(), &config.source_root, &config.extension);
    debug!(
        "{} of {} changed path(s) are documents under {}",
        documents.len(),
        paths.len(),
        config.source_root
    );
    Detection::Changed(documents)
}
