//! Shared utilities for doc-translate

use anyhow::{bail, Context, Result};
use std::fmt;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// A string wrapper that masks its contents in Debug/Display output.
/// Keeps provider credentials out of logs and config dumps.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Intentionally access the raw secret value (for auth headers)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<&str> for SecretString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
/// `"es, fr,,de "` -> `["es", "fr", "de"]`
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run a command to completion, killing the child if it outlives `timeout`.
/// Non-zero exit is not an error here; callers inspect `Output::status`.
pub async fn run_cmd_with_timeout(mut cmd: Command, timeout: Duration) -> Result<Output> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("Failed to spawn command")?;

    // On expiry the output future is dropped together with the child
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.context("Failed to execute command"),
        Err(_) => bail!("Command timed out after {:?}", timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_hides_in_debug() {
        let secret = SecretString::new("sk-live-123".to_string());
        let debug_output = format!("{:?}", secret);
        assert_eq!(debug_output, "***");
        assert!(!debug_output.contains("sk-live"));
    }

    #[test]
    fn test_secret_string_hides_in_display() {
        let secret = SecretString::new("sk-live-123".to_string());
        assert_eq!(format!("{}", secret), "***");
    }

    #[test]
    fn test_secret_string_expose_returns_value() {
        let secret: SecretString = "test-key".into();
        assert_eq!(secret.expose(), "test-key");
        assert!(secret == "test-key");
    }

    #[test]
    fn test_secret_string_whitespace_is_empty() {
        assert!(SecretString::new("  ".to_string()).is_empty());
        assert!(SecretString::default().is_empty());
        assert!(!SecretString::new("k".to_string()).is_empty());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("es"), vec!["es"]);
        assert_eq!(split_list("es, fr,,de "), vec!["es", "fr", "de"]);
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_cmd_reports_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hi; exit 3"]);
        let output = run_cmd_with_timeout(cmd, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hi");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_cmd_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = std::time::Instant::now();
        let result = run_cmd_with_timeout(cmd, Duration::from_millis(100)).await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_cmd_missing_binary() {
        let cmd = Command::new("doc-translate-no-such-binary-xyz");
        assert!(run_cmd_with_timeout(cmd, Duration::from_secs(1))
            .await
            .is_err());
    }
}
